use crate::record::Record;

/// Consumer of discovered records.
///
/// Implementations report their own failures; nothing flows back into the
/// polling code.
pub trait Sink: Send {
    fn emit(&mut self, records: &[Record]);
}

/// Collects records in memory
impl Sink for Vec<Record> {
    fn emit(&mut self, records: &[Record]) {
        self.extend_from_slice(records);
    }
}
