//! Station records.

/// A station as listed in the timetable page's station picker.
///
/// The id is assigned by the source site and doubles as the primary key of
/// the `stations` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Station {
    pub id: u32,
    pub name: String,
}

impl Station {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
