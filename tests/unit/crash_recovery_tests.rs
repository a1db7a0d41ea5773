#[cfg(test)]
mod tests_crash_recovery {
    use prevalence_rs::prelude::*;
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};

    fn open_with(config: JournalConfig) -> PersistentJournal {
        PersistentJournal::open(config).expect("open journal")
    }

    fn record(sequence: u64, payload: &str) -> TransactionRecord {
        TransactionRecord::new(sequence, sequence, payload.as_bytes().to_vec())
    }

    fn journal_path(dir: &Path, sequence: u64) -> PathBuf {
        dir.join(format!("{sequence:019}.journal"))
    }

    fn chop(path: &Path, bytes: u64) {
        let len = std::fs::metadata(path).expect("metadata").len();
        let file = OpenOptions::new().write(true).open(path).expect("open");
        file.set_len(len - bytes).expect("truncate");
    }

    fn quarantined_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.contains(".unusedFile"))
            .collect()
    }

    fn replay(dir: &Path) -> (PersistentJournal, Vec<TransactionRecord>) {
        let journal = open_with(JournalConfig::new(dir));
        let mut seen: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut seen, 1).expect("replay");
        (journal, seen)
    }

    fn payloads(records: &[TransactionRecord]) -> Vec<String> {
        records
            .iter()
            .map(|record| String::from_utf8_lossy(record.payload()).into_owned())
            .collect()
    }

    #[test]
    fn torn_last_record_is_dropped_and_its_sequence_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open_with(JournalConfig::new(dir.path()));
            journal
                .update(&mut Vec::<TransactionRecord>::new(), 1)
                .expect("init");
            for (sequence, payload) in [(1, "a"), (2, "b"), (3, "c")] {
                journal.append(&record(sequence, payload)).expect("append");
            }
            journal.close().expect("close");
        }
        chop(&journal_path(dir.path(), 1), 2);

        let (journal, seen) = replay(dir.path());
        assert_eq!(payloads(&seen), vec!["a", "b"]);
        assert_eq!(journal.next_transaction().expect("counter"), 3);
        // The damaged file still holds records 1 and 2, so it keeps its name.
        assert!(journal_path(dir.path(), 1).exists());
        assert!(quarantined_files(dir.path()).is_empty());

        journal.append(&record(3, "c again")).expect("append");
        journal.close().expect("close");
        assert!(journal_path(dir.path(), 3).exists());

        let (_, seen) = replay(dir.path());
        assert_eq!(payloads(&seen), vec!["a", "b", "c again"]);
    }

    #[test]
    fn file_whose_only_record_is_torn_is_quarantined() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal =
                open_with(JournalConfig::new(dir.path()).with_size_threshold_bytes(1));
            journal
                .update(&mut Vec::<TransactionRecord>::new(), 1)
                .expect("init");
            for (sequence, payload) in [(1, "a"), (2, "b"), (3, "c")] {
                journal.append(&record(sequence, payload)).expect("append");
            }
            journal.close().expect("close");
        }
        let lost = journal_path(dir.path(), 3);
        chop(&lost, 5);

        let (journal, seen) = replay(dir.path());
        assert_eq!(payloads(&seen), vec!["a", "b"]);
        assert_eq!(journal.next_transaction().expect("counter"), 3);
        assert!(!lost.exists());
        assert_eq!(quarantined_files(dir.path()).len(), 1);
        assert_eq!(journal.journal_files().expect("files").len(), 2);

        journal.append(&record(3, "replacement")).expect("append");
        journal.close().expect("close");

        let (journal, seen) = replay(dir.path());
        assert_eq!(payloads(&seen), vec!["a", "b", "replacement"]);
        assert_eq!(journal.next_transaction().expect("counter"), 4);
        assert_eq!(quarantined_files(dir.path()).len(), 1);
    }

    #[test]
    fn empty_file_left_by_a_crash_is_quarantined() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(journal_path(dir.path(), 1), b"").expect("write");

        let (journal, seen) = replay(dir.path());
        assert!(seen.is_empty());
        assert_eq!(journal.next_transaction().expect("counter"), 1);
        assert_eq!(quarantined_files(dir.path()).len(), 1);

        journal.append(&record(1, "first")).expect("append");
    }

    #[test]
    fn zero_filled_tail_is_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open_with(JournalConfig::new(dir.path()));
            journal
                .update(&mut Vec::<TransactionRecord>::new(), 1)
                .expect("init");
            journal.append(&record(1, "kept")).expect("append");
            journal.close().expect("close");
        }
        let path = journal_path(dir.path(), 1);
        let len = std::fs::metadata(&path).expect("metadata").len();
        let file = OpenOptions::new().write(true).open(&path).expect("open");
        file.set_len(len + 4096).expect("extend");

        let (journal, seen) = replay(dir.path());
        assert_eq!(payloads(&seen), vec!["kept"]);
        assert_eq!(journal.next_transaction().expect("counter"), 2);
        assert!(journal.verify_integrity().is_ok());
    }

    #[test]
    fn torn_tail_survives_integrity_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open_with(JournalConfig::new(dir.path()));
        journal
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("init");
        journal.append(&record(1, "one")).expect("append");
        journal.append(&record(2, "two")).expect("append");
        journal.close().expect("close");

        chop(&journal_path(dir.path(), 1), 1);
        assert!(journal.verify_integrity().is_ok());
    }
}
