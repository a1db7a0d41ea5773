#[cfg(test)]
mod tests_recovery {
    use prevalence_rs::journal::chunk::encode_chunk;
    use prevalence_rs::prelude::*;
    use std::path::{Path, PathBuf};

    fn open(dir: &Path) -> PersistentJournal {
        PersistentJournal::open(JournalConfig::new(dir)).expect("open journal")
    }

    fn record(sequence: u64) -> TransactionRecord {
        TransactionRecord::new(
            sequence,
            1_700_000_000_000_000_000 + sequence,
            format!("transaction {sequence}").into_bytes(),
        )
    }

    fn file_name(sequence: u64, suffix: &str) -> String {
        format!("{sequence:019}.{suffix}")
    }

    /// Write a journal file by hand, one chunk per record.
    fn write_journal_file(dir: &Path, name: &str, records: &[TransactionRecord]) -> PathBuf {
        let mut bytes = Vec::new();
        for record in records {
            bytes.extend(encode_chunk(&record.encode()).expect("encode chunk"));
        }
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write journal file");
        path
    }

    fn versions(records: &[TransactionRecord]) -> Vec<u64> {
        records.iter().map(TransactionRecord::system_version).collect()
    }

    #[test]
    fn empty_directory_then_append_then_restart_replays_the_record() {
        let dir = tempfile::tempdir().expect("tempdir");

        let journal = open(dir.path());
        let mut first: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut first, 1).expect("initial update");
        assert!(first.is_empty());
        assert_eq!(journal.next_transaction().expect("counter"), 1);

        let rec = record(1);
        journal.append(&rec).expect("append");
        assert_eq!(journal.next_transaction().expect("counter"), 2);
        assert!(dir.path().join(file_name(1, "journal")).exists());
        journal.close().expect("close");

        let restarted = open(dir.path());
        let mut second: Vec<TransactionRecord> = Vec::new();
        restarted.update(&mut second, 1).expect("replay");
        assert_eq!(second, vec![rec]);
        assert_eq!(restarted.next_transaction().expect("counter"), 2);
    }

    #[test]
    fn replay_starts_mid_file_and_crosses_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(2)]);
        write_journal_file(dir.path(), &file_name(3, "journal"), &[record(3), record(4)]);

        let journal = open(dir.path());
        let mut seen: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut seen, 2).expect("replay");

        assert_eq!(versions(&seen), vec![2, 3, 4]);
        assert_eq!(journal.next_transaction().expect("counter"), 5);
    }

    #[test]
    fn round_trip_preserves_payloads_and_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written: Vec<TransactionRecord> = (1..=50)
            .map(|sequence| {
                TransactionRecord::new(sequence, sequence * 7_919, vec![sequence as u8; sequence as usize])
                    .with_content_type("application/octet-stream")
                    .expect("content type")
            })
            .collect();

        let journal = open(dir.path());
        journal
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("initial update");
        for record in &written {
            journal.append(record).expect("append");
        }
        journal.close().expect("close");

        let mut replayed: Vec<TransactionRecord> = Vec::new();
        open(dir.path()).update(&mut replayed, 1).expect("replay");
        assert_eq!(replayed, written);
    }

    #[test]
    fn second_update_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(2)]);

        let journal = open(dir.path());
        let mut seen: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut seen, 1).expect("replay");
        assert_eq!(seen.len(), 2);

        journal.update(&mut seen, 1).expect("same wanted");
        journal.update(&mut seen, 3).expect("wanted equals counter");
        assert_eq!(seen.len(), 2);
        assert_eq!(journal.next_transaction().expect("counter"), 3);

        journal.append(&record(3)).expect("append");
        journal.update(&mut seen, 2).expect("after an append");
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn second_update_on_fresh_journal_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path());
        let mut seen: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut seen, 10).expect("fresh");
        journal.update(&mut seen, 10).expect("again");
        assert_eq!(journal.next_transaction().expect("counter"), 10);
    }

    #[test]
    fn wanting_beyond_the_log_fails_with_the_gap() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(2)]);

        let journal = open(dir.path());
        let err = journal
            .update(&mut Vec::<TransactionRecord>::new(), 9)
            .expect_err("gap");
        assert!(matches!(
            err,
            JournalError::NotYetReached {
                wanted: 9,
                last_logged: 2
            }
        ));

        let live = open(dir.path());
        live.update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("replay");
        let err = live
            .update(&mut Vec::<TransactionRecord>::new(), 4)
            .expect_err("gap on revalidation");
        assert!(err.to_string().contains("not yet reached transaction 4"));
    }

    #[test]
    fn deleted_file_is_detected_on_revalidation() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(2)]);
        let second =
            write_journal_file(dir.path(), &file_name(3, "journal"), &[record(3), record(4)]);

        let journal = open(dir.path());
        journal
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("replay");
        std::fs::remove_file(second).expect("remove file");

        let err = journal
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect_err("missing file");
        assert!(matches!(err, JournalError::MissingJournalFile { sequence: 3 }));
        assert_eq!(journal.state(), JournalState::Poisoned);
    }

    #[test]
    fn wanted_before_every_file_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(5, "journal"), &[record(5)]);

        let err = open(dir.path())
            .update(&mut Vec::<TransactionRecord>::new(), 2)
            .expect_err("missing");
        assert!(matches!(err, JournalError::MissingJournalFile { sequence: 2 }));
    }

    #[test]
    fn misnumbered_record_fails_replay() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(7)]);

        let mut seen: Vec<TransactionRecord> = Vec::new();
        let err = open(dir.path())
            .update(&mut seen, 1)
            .expect_err("mismatch");
        assert_eq!(err.to_string(), "expected 2 but was 7");
        assert_eq!(versions(&seen), vec![1]);
    }

    #[test]
    fn failed_replay_is_never_delivered_twice() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(7)]);

        let journal = open(dir.path());
        let mut seen: Vec<TransactionRecord> = Vec::new();
        journal.update(&mut seen, 1).expect_err("mismatch");
        assert_eq!(journal.state(), JournalState::Poisoned);

        let err = journal.update(&mut seen, 1).expect_err("halted");
        assert!(matches!(err, JournalError::Unavailable { .. }));
        assert_eq!(versions(&seen), vec![1]);
        assert!(matches!(
            journal.next_transaction(),
            Err(JournalError::NotInitialized)
        ));
    }

    #[test]
    fn records_below_wanted_are_not_checked_or_delivered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(
            dir.path(),
            &file_name(1, "journal"),
            &[record(1), record(99), record(3)],
        );

        let mut seen: Vec<TransactionRecord> = Vec::new();
        open(dir.path()).update(&mut seen, 3).expect("replay");
        assert_eq!(versions(&seen), vec![3]);
    }

    #[test]
    fn records_in_another_journal_kind_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_journal_file(dir.path(), &file_name(1, "xmlJournal"), &[record(1)]);

        let err = open(dir.path())
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect_err("unsupported kind");
        assert!(matches!(err, JournalError::UnsupportedJournalKind { .. }));
    }

    #[test]
    fn corruption_in_the_middle_fails_recovery() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path =
            write_journal_file(dir.path(), &file_name(1, "journal"), &[record(1), record(2)]);
        let mut bytes = std::fs::read(&path).expect("read");
        bytes[10] ^= 0x55;
        std::fs::write(&path, bytes).expect("write");

        let err = open(dir.path())
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect_err("corrupt");
        assert!(matches!(err, JournalError::CorruptEntry { offset: 0, .. }));
    }

    #[test]
    fn invalid_configuration_fails_at_open() {
        let dir = tempfile::tempdir().expect("tempdir");

        let bad_suffix = JournalConfig::new(dir.path()).with_suffix("journal.bak");
        assert!(matches!(
            PersistentJournal::open(bad_suffix),
            Err(JournalError::InvalidConfiguration { .. })
        ));

        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"x").expect("write");
        assert!(matches!(
            PersistentJournal::open(JournalConfig::new(&not_a_dir)),
            Err(JournalError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn journals_in_different_directories_are_independent() {
        let left_dir = tempfile::tempdir().expect("tempdir");
        let right_dir = tempfile::tempdir().expect("tempdir");
        let left = open(left_dir.path());
        let right = open(right_dir.path());
        left.update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("left");
        right
            .update(&mut Vec::<TransactionRecord>::new(), 100)
            .expect("right");

        left.append(&record(1)).expect("left append");
        right.append(&record(100)).expect("right append");

        assert_eq!(left.next_transaction().expect("left"), 2);
        assert_eq!(right.next_transaction().expect("right"), 101);
        assert_eq!(left.journal_files().expect("files").len(), 1);
        assert_eq!(right.journal_files().expect("files").len(), 1);
    }
}
