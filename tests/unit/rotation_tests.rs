#[cfg(test)]
mod tests_rotation {
    use prevalence_rs::journal::CHUNK_OVERHEAD;
    use prevalence_rs::journal::types::RECORD_HEADER_SIZE;
    use prevalence_rs::journal::directory::journal_version;
    use prevalence_rs::prelude::*;
    use std::time::Duration;

    const PAYLOAD: &[u8] = b"0123456789";

    fn record(sequence: u64) -> TransactionRecord {
        TransactionRecord::new(sequence, 0, PAYLOAD.to_vec())
    }

    fn initialized(config: JournalConfig) -> PersistentJournal {
        let journal = PersistentJournal::open(config).expect("open journal");
        journal
            .update(&mut Vec::<TransactionRecord>::new(), 1)
            .expect("init");
        journal
    }

    fn first_sequences(journal: &PersistentJournal) -> Vec<u64> {
        journal
            .journal_files()
            .expect("files")
            .iter()
            .map(|path| journal_version(path).expect("version"))
            .collect()
    }

    #[test]
    fn disabled_thresholds_never_rotate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = initialized(JournalConfig::new(dir.path()));
        for sequence in 1..=200 {
            journal.append(&record(sequence)).expect("append");
        }
        assert_eq!(first_sequences(&journal), vec![1]);
    }

    #[test]
    fn size_threshold_opens_a_new_file_once_reached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chunk_size = (CHUNK_OVERHEAD + RECORD_HEADER_SIZE + PAYLOAD.len()) as u64;
        let journal = initialized(
            JournalConfig::new(dir.path()).with_size_threshold_bytes(2 * chunk_size),
        );

        for sequence in 1..=7 {
            journal.append(&record(sequence)).expect("append");
        }
        assert_eq!(first_sequences(&journal), vec![1, 3, 5, 7]);
        journal.close().expect("close");

        for path in journal.journal_files().expect("files") {
            let size = std::fs::metadata(&path).expect("metadata").len();
            assert!(size <= 2 * chunk_size);
        }
    }

    #[test]
    fn threshold_just_above_one_chunk_still_holds_two() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chunk_size = (CHUNK_OVERHEAD + RECORD_HEADER_SIZE + PAYLOAD.len()) as u64;
        let journal =
            initialized(JournalConfig::new(dir.path()).with_size_threshold_bytes(chunk_size + 1));

        for sequence in 1..=4 {
            journal.append(&record(sequence)).expect("append");
        }
        assert_eq!(first_sequences(&journal), vec![1, 3]);
    }

    #[test]
    fn age_threshold_opens_a_new_file_once_elapsed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = initialized(
            JournalConfig::new(dir.path()).with_age_threshold(Duration::from_millis(1)),
        );

        journal.append(&record(1)).expect("append");
        std::thread::sleep(Duration::from_millis(10));
        journal.append(&record(2)).expect("append");
        std::thread::sleep(Duration::from_millis(10));
        journal.append(&record(3)).expect("append");

        assert_eq!(first_sequences(&journal), vec![1, 2, 3]);
    }

    #[test]
    fn rotated_files_replay_as_one_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = initialized(JournalConfig::new(dir.path()).with_size_threshold_bytes(100));
        for sequence in 1..=25 {
            journal.append(&record(sequence)).expect("append");
        }
        journal.close().expect("close");
        assert!(journal.journal_files().expect("files").len() > 1);

        let restarted =
            PersistentJournal::open(JournalConfig::new(dir.path())).expect("open journal");
        let mut seen: Vec<TransactionRecord> = Vec::new();
        restarted.update(&mut seen, 1).expect("replay");
        let versions: Vec<u64> = seen.iter().map(TransactionRecord::system_version).collect();
        assert_eq!(versions, (1..=25).collect::<Vec<_>>());
        assert!(restarted.verify_integrity().is_ok());
    }

    #[test]
    fn restart_always_starts_a_new_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = initialized(JournalConfig::new(dir.path()));
            journal.append(&record(1)).expect("append");
            journal.close().expect("close");
        }
        let journal = initialized(JournalConfig::new(dir.path()));
        journal.append(&record(2)).expect("append");
        assert_eq!(first_sequences(&journal), vec![1, 2]);
    }

    #[test]
    fn custom_suffix_names_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = initialized(JournalConfig::new(dir.path()).with_suffix("bankJournal"));
        journal.append(&record(1)).expect("append");
        assert!(dir.path().join("0000000000000000001.bankJournal").exists());
    }
}
