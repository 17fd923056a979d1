use tracing::{debug, warn};

use super::{DirectoryResult, Namespace};

/// One row of an OS identity table; the name is absent when the table left it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsEntry {
    pub id: u32,
    pub name: Option<String>,
}

impl OsEntry {
    pub fn new(id: u32, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(str::to_string),
        }
    }
}

/// Cursor over a user or group table.
///
/// `close` must be safe to call after a failed `next_entry`; `enumerate` calls
/// it exactly once per successful `open`.
pub trait PrincipalTableReader {
    fn namespace(&self) -> Namespace;
    fn open(&mut self) -> DirectoryResult<()>;
    fn next_entry(&mut self) -> DirectoryResult<Option<OsEntry>>;
    fn close(&mut self) -> DirectoryResult<()>;
}

struct OpenTable<'a, R: PrincipalTableReader + ?Sized> {
    reader: &'a mut R,
    closed: bool,
}

impl<R: PrincipalTableReader + ?Sized> OpenTable<'_, R> {
    fn finish(mut self) -> DirectoryResult<()> {
        self.closed = true;
        self.reader.close()
    }
}

impl<R: PrincipalTableReader + ?Sized> Drop for OpenTable<'_, R> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.reader.close() {
            warn!(namespace = %self.reader.namespace(), error = %err, "closing principal table failed");
        }
    }
}

/// Reads every entry of the table, closing it on every exit path.
///
/// A read error discards what was read so far; a close error after a clean
/// read fails the enumeration as well.
pub fn enumerate<R>(reader: &mut R) -> DirectoryResult<Vec<OsEntry>>
where
    R: PrincipalTableReader + ?Sized,
{
    let namespace = reader.namespace();
    debug!(namespace = %namespace, "principal enumeration start");
    reader.open()?;
    let table = OpenTable {
        reader,
        closed: false,
    };
    let mut entries = Vec::new();
    while let Some(entry) = table.reader.next_entry()? {
        entries.push(entry);
    }
    table.finish()?;
    debug!(namespace = %namespace, count = entries.len(), "principal enumeration done");
    Ok(entries)
}
