#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests reading produced archives back with an independent ZIP
//! reader
//!
//! Validates that entry names, contents and stored CRC-32 values survive a
//! full write/read cycle and that the archive carries an unlock script next to
//! manifest files the way packaged results do.

use depotgate_formats::archive::{ArchiveEntry, ArchiveWriter};
use depotgate_formats::crc32::crc32;
use depotgate_formats::ids::{AppId, DepotKeys, ManifestMap};
use depotgate_formats::manifest::manifest_file_name;
use depotgate_formats::script::{ScriptInput, generate, scan};
use proptest::prelude::*;
use std::io::{Cursor, Read};
use zip::ZipArchive;

fn read_back(bytes: &[u8]) -> Vec<(String, u32, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("entry should exist");
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .expect("entry should decompress");
            (file.name().to_string(), file.crc32(), content)
        })
        .collect()
}

#[test]
fn package_layout_reads_back() {
    let app_id = AppId::new(228_980);
    let mut keys = DepotKeys::new();
    keys.insert(228_988, "44d8c45ce229a11c4f231a3d2a350eaf");
    let mut manifests = ManifestMap::new();
    manifests.insert(228_988, "6645201662696499616".to_string());
    manifests.insert(228_990, "1829726630299308803".to_string());

    let script = generate(&ScriptInput {
        app_id,
        keys: &keys,
        manifests: &manifests,
        dlc_ids: &[],
        set_manifest_id: true,
    });

    let mut entries = vec![ArchiveEntry::new(
        format!("{app_id}.lua"),
        script.clone().into_bytes(),
    )];
    for (depot_id, manifest_id) in &manifests {
        entries.push(ArchiveEntry::new(
            manifest_file_name(*depot_id, manifest_id),
            vec![0x5A; 512],
        ));
    }

    let bytes = ArchiveWriter::build(&entries).expect("archive should build");
    let files = read_back(&bytes);

    let names: Vec<&str> = files.iter().map(|(n, _, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "228980.lua",
            "228988_6645201662696499616.manifest",
            "228990_1829726630299308803.manifest",
        ]
    );

    let (_, stored_crc, content) = &files[0];
    assert_eq!(*stored_crc, crc32(script.as_bytes()));
    let recovered = scan(&String::from_utf8(content.clone()).expect("script is UTF-8"));
    assert_eq!(recovered.keys, keys);
    assert_eq!(recovered.manifests, manifests);
}

#[test]
fn empty_archive_opens() {
    let bytes = ArchiveWriter::build(&[]).expect("archive should build");
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("archive should open");
    assert_eq!(archive.len(), 0);
}

#[test]
fn large_compressible_entry() {
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 7) as u8).collect();
    let bytes = ArchiveWriter::build(&[ArchiveEntry::new("big.bin", content.clone())])
        .expect("archive should build");
    assert!(bytes.len() < content.len());

    let files = read_back(&bytes);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].2, content);
    assert_eq!(files[0].1, crc32(&content));
}

fn entry_name() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,12}(/[a-z0-9_]{1,12}){0,2}\\.(lua|manifest|bin)"
}

proptest! {
    /// Any entry list with distinct names reads back unchanged
    #[test]
    fn archive_round_trip(
        files in prop::collection::btree_map(
            entry_name(),
            prop::collection::vec(any::<u8>(), 0..2048),
            0..8,
        )
    ) {
        let entries: Vec<ArchiveEntry> = files
            .iter()
            .map(|(name, content)| ArchiveEntry::new(name.clone(), content.clone()))
            .collect();

        let bytes = ArchiveWriter::build(&entries).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let read = read_back(&bytes);

        prop_assert_eq!(read.len(), entries.len());
        for ((name, stored_crc, content), entry) in read.iter().zip(&entries) {
            prop_assert_eq!(name, &entry.path);
            prop_assert_eq!(*stored_crc, crc32(&entry.content));
            prop_assert_eq!(content, &entry.content);
        }
    }

    /// Building twice yields identical bytes
    #[test]
    fn archive_is_deterministic(
        content in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let entries = [ArchiveEntry::new("a.bin", content)];
        let first = ArchiveWriter::build(&entries).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = ArchiveWriter::build(&entries).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(first, second);
    }
}
