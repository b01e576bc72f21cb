//! Crash-safety properties of the journal-backed result store

use persistence::journal::{JournalConfig, JournalEntry, JournalWriter, RecordKind};
use persistence::reader::JournalReader;
use persistence::{seal_result, ResultStore};
use proptest::prelude::*;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::TempDir;
use types::allotment::{Allotment, MatchStats, MatchingResult};
use types::ids::{BranchId, StudentId};

fn sealed(students: u64, run_at: i64) -> MatchingResult {
    let allotments: Vec<Allotment> = (1..=students)
        .map(|s| Allotment::matched(StudentId::new(s), BranchId::new(s % 3), Some(1)))
        .collect();
    let stats = MatchStats::tally(&allotments, students);
    seal_result(allotments, stats, run_at).unwrap()
}

#[test]
fn store_survives_torn_final_write() {
    let tmp = TempDir::new().unwrap();
    let keep = {
        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        let keep = store.publish(sealed(4, 1)).unwrap();
        store.publish(sealed(5, 2)).unwrap();
        keep
    };

    // Tear the second record in half
    let path = tmp.path().join("results-000000.journal");
    let data = fs::read(&path).unwrap();
    let (_, first_len) = JournalEntry::from_bytes(&data).unwrap();
    let torn = first_len + (data.len() - first_len) / 2;
    fs::write(&path, &data[..torn]).unwrap();

    let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.active().unwrap().unwrap().id, keep.id);

    // New writes land after the repaired tail and replay cleanly
    let next = store.publish(sealed(6, 3)).unwrap();
    drop(store);
    let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(store.active().unwrap().unwrap().id, next.id);
}

#[test]
fn results_published_after_a_failed_append_survive_restart() {
    let tmp = TempDir::new().unwrap();
    let (first, second) = {
        let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
        let first = store.publish(sealed(3, 1)).unwrap();

        // Bytes left behind by an append that died half way
        let path = tmp.path().join("results-000000.journal");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x90, 0x01, 0x00, 0x00, 0x02, 0x00]).unwrap();
        drop(file);

        let second = store.publish(sealed(4, 2)).unwrap();
        (first, second)
    };

    let store = ResultStore::open(JournalConfig::new(tmp.path())).unwrap();
    let history: Vec<_> = store.history().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(history, vec![second.id, first.id]);
    assert_eq!(store.active().unwrap().unwrap().id, second.id);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_truncation_reads_a_prefix(
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 1..8),
        cut_seed in any::<u64>(),
    ) {
        let tmp = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(JournalConfig::new(tmp.path())).unwrap();
        let mut written = Vec::new();
        for (idx, payload) in payloads.iter().enumerate() {
            written.push(
                writer
                    .write_record(RecordKind::ResultPublished, idx as i64, payload.clone())
                    .unwrap(),
            );
        }
        let path = writer.current_file_path().to_path_buf();
        drop(writer);

        let data = fs::read(&path).unwrap();
        let cut = (cut_seed % (data.len() as u64 + 1)) as usize;
        fs::write(&path, &data[..cut]).unwrap();

        let mut reader = JournalReader::open(tmp.path()).unwrap();
        let (entries, corruption) = reader.recover_entries().unwrap();

        prop_assert!(entries.len() <= written.len());
        prop_assert_eq!(&entries[..], &written[..entries.len()]);
        prop_assert!(corruption.len() <= 1);
        if cut == data.len() {
            prop_assert_eq!(entries.len(), written.len());
            prop_assert!(corruption.is_empty());
        }
    }
}
