//! Tail-bounded file reads.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::store::StoreError;

/// Read at most the last `max_records * record_size` bytes of `path`.
///
/// Cost is O(bytes read), independent of total file size; a file that has
/// grown to gigabytes costs the same as a small one. A missing file is the
/// normal "no data yet" case and reads as an empty buffer.
///
/// The file size is sampled once; records appended concurrently after that
/// sample are simply not part of this read. Because appends are whole
/// single-record writes from one owning writer, the returned buffer never
/// ends inside a torn record for that reason alone (a genuinely half-written
/// tail is discarded downstream by the decoder).
pub fn read_tail(path: &Path, record_size: usize, max_records: usize) -> Result<Vec<u8>, StoreError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let wrap = |source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    };

    let size = file.metadata().map_err(wrap)?.len();
    let wanted = (max_records as u64).saturating_mul(record_size as u64);
    let take = size.min(wanted);

    file.seek(SeekFrom::Start(size - take)).map_err(wrap)?;

    let mut buf = Vec::with_capacity(take as usize);
    // Cap at the sampled size so a concurrent append cannot leak extra
    // bytes into this read.
    file.take(take).read_to_end(&mut buf).map_err(wrap)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const REC: usize = 12;

    fn write_records(path: &Path, n: usize) -> Vec<u8> {
        let mut all = Vec::new();
        for i in 0..n {
            let mut rec = vec![i as u8; REC];
            rec[REC - 1] = 0xEE;
            all.extend_from_slice(&rec);
        }
        std::fs::write(path, &all).unwrap();
        all
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let buf = read_tail(&dir.path().join("absent.bin"), REC, 100).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_tail_is_byte_identical_to_slicing_full_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bin");
        let all = write_records(&path, 10);

        let tail = read_tail(&path, REC, 4).unwrap();
        assert_eq!(tail.len(), 4 * REC);
        assert_eq!(tail, all[all.len() - 4 * REC..]);
    }

    #[test]
    fn test_bound_larger_than_file_returns_whole_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bin");
        let all = write_records(&path, 3);

        let tail = read_tail(&path, REC, 1000).unwrap();
        assert_eq!(tail, all);
    }

    #[test]
    fn test_partial_trailing_record_included_as_is() {
        // The tail reader is byte-oriented; discarding a partial trailing
        // record is the decoder's job.
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bin");
        let mut all = write_records(&path, 2);
        all.extend_from_slice(&[0xAB; 5]);
        std::fs::write(&path, &all).unwrap();

        let tail = read_tail(&path, REC, 100).unwrap();
        assert_eq!(tail.len(), 2 * REC + 5);
    }

    #[test]
    fn test_zero_records_requested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.bin");
        write_records(&path, 5);
        assert!(read_tail(&path, REC, 0).unwrap().is_empty());
    }
}
