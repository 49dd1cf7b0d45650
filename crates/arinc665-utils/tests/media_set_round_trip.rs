//! End-to-end compile / decompile tests against a real directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use arinc645::CheckValueType;
use arinc665_files::{FileListFile, FileType, MediumNumber, PartNumber, SupportedArinc665Version};
use arinc665_media::{CheckValues, ContainerId, FileKind, FilePathMapping, MediaSet};
use arinc665_utils::{Error, FileCreationPolicy, MediaSetCompiler, MediaSetDecompiler};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn medium_dir(root: &Path, medium: MediumNumber) -> PathBuf {
    root.join(format!("MEDIUM_{medium}"))
}

fn compile_media_set(
    media_set: &MediaSet,
    mapping: &FilePathMapping,
    output_base: &Path,
    version: SupportedArinc665Version,
    load_policy: FileCreationPolicy,
    batch_policy: FileCreationPolicy,
) -> arinc665_utils::Result<PathBuf> {
    let root = output_base.join(media_set.part_number());

    let compiler = MediaSetCompiler::new(
        media_set,
        mapping,
        Box::new(|medium, path, raw| {
            fs::write(medium_dir(&root, medium).join(path), raw)?;
            Ok(())
        }),
        Box::new(|medium, path| Ok(fs::read(medium_dir(&root, medium).join(path))?)),
        Box::new(|medium, path| {
            fs::create_dir_all(medium_dir(&root, medium).join(path))?;
            Ok(())
        }),
        Box::new(|source, medium, path| {
            fs::copy(source, medium_dir(&root, medium).join(path))?;
            Ok(())
        }),
    )
    .arinc665_version(version)
    .create_load_header_files(load_policy)
    .create_batch_files(batch_policy)
    .output_exists_handler(Box::new(|name| Ok(output_base.join(name).exists())));

    let paths = compiler.compile()?;
    assert_eq!(paths.media_set_root, media_set.part_number());
    Ok(root)
}

fn decompile_media_set(
    root: &Path,
    check_integrity: bool,
) -> arinc665_utils::Result<(MediaSet, CheckValues)> {
    MediaSetDecompiler::new(Box::new(|medium, path| {
        Ok(fs::read(medium_dir(root, medium).join(path))?)
    }))
    .check_file_integrity(check_integrity)
    .decompile()
}

/// Normalized, order-independent description of a media set's structure.
fn describe(media_set: &MediaSet) -> Vec<String> {
    let mut lines = Vec::new();

    for file in media_set.recursive_files() {
        let path = media_set.path_of_file(file).unwrap();
        let medium = media_set.effective_medium_number(file).unwrap();

        match media_set.file_kind(file).unwrap() {
            FileKind::Regular => lines.push(format!("file {path} medium {medium}")),
            FileKind::Load(load) => {
                let data: Vec<String> = load
                    .data_files()
                    .iter()
                    .map(|reference| {
                        format!(
                            "{}={}",
                            media_set.path_of_file(reference.file).unwrap(),
                            reference.part_number
                        )
                    })
                    .collect();
                let support: Vec<String> = load
                    .support_files()
                    .iter()
                    .map(|reference| {
                        format!(
                            "{}={}",
                            media_set.path_of_file(reference.file).unwrap(),
                            reference.part_number
                        )
                    })
                    .collect();
                lines.push(format!(
                    "load {path} medium {medium} pn {} flags {} thw {:?} data [{}] support [{}] udd {:02x?}",
                    load.part_number,
                    load.part_flags,
                    load.target_hardware_ids(),
                    data.join(","),
                    support.join(","),
                    load.user_defined_data(),
                ));
            }
            FileKind::Batch(batch) => {
                let targets: Vec<String> = batch
                    .targets()
                    .iter()
                    .map(|target| {
                        let loads: Vec<String> = target
                            .loads()
                            .iter()
                            .map(|load| media_set.path_of_file(*load).unwrap())
                            .collect();
                        format!("{}:[{}]", target.target_hardware_id, loads.join(","))
                    })
                    .collect();
                lines.push(format!(
                    "batch {path} medium {medium} pn {} comment {:?} targets [{}]",
                    batch.part_number,
                    batch.comment,
                    targets.join(";"),
                ));
            }
        }
    }

    lines.sort();
    lines
}

fn assert_same_structure(original: &MediaSet, decompiled: &MediaSet) {
    assert_eq!(original.part_number(), decompiled.part_number());
    assert_eq!(original.media_count(), decompiled.media_count());
    assert_eq!(
        original.files_user_defined_data,
        decompiled.files_user_defined_data
    );
    assert_eq!(
        original.loads_user_defined_data,
        decompiled.loads_user_defined_data
    );
    assert_eq!(
        original.batches_user_defined_data,
        decompiled.batches_user_defined_data
    );
    assert_eq!(describe(original), describe(decompiled));
}

fn batch_part_number() -> String {
    PartNumber::new("AB1", "BTCH0001").unwrap().to_string()
}

/// A media set with one payload file, one load and no batches.
fn single_medium_set(source_dir: &Path) -> (MediaSet, FilePathMapping) {
    let mut media_set = MediaSet::new("ABC00ABCDEFGH");

    let app = media_set
        .create_regular_file(ContainerId::Root, "APP.BIN")
        .unwrap();
    let load = media_set.create_load(ContainerId::Root, "APP.LUH").unwrap();
    {
        let load_data = media_set.load_mut(load).unwrap();
        load_data.part_number = "LOAD-PN-1".to_string();
        load_data.set_target_hardware_id("FMS-L", Vec::new());
    }
    media_set
        .add_load_data_file(load, app, "DF-PN-1", None)
        .unwrap();

    let payload = vec![0xA5u8; 32 * 1024];
    let source = source_dir.join("APP.BIN");
    fs::write(&source, payload).unwrap();

    let mut mapping = FilePathMapping::new();
    mapping.insert(app, source);

    (media_set, mapping)
}

#[test]
fn test_single_medium_compile() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    let medium = medium_dir(&root, MediumNumber::new(1));
    assert!(medium.join("FILES.LUM").is_file());
    assert!(medium.join("LOADS.LUM").is_file());
    assert!(medium.join("APP.BIN").is_file());
    assert!(medium.join("APP.LUH").is_file());
    // No batches in the model, no list of batches on the medium
    assert!(!medium.join("BATCHES.LUM").exists());

    let (decompiled, _check_values) = decompile_media_set(&root, true).unwrap();
    assert_same_structure(&media_set, &decompiled);
}

#[test]
fn test_two_medium_split_load() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let mut media_set = MediaSet::new("MSET0012345");
    media_set.set_media_count(MediumNumber::new(2));

    let data = media_set
        .create_regular_file(ContainerId::Root, "A.BIN")
        .unwrap();
    media_set
        .set_file_medium_number(data, Some(MediumNumber::new(1)))
        .unwrap();
    let support = media_set
        .create_regular_file(ContainerId::Root, "B.BIN")
        .unwrap();
    media_set
        .set_file_medium_number(support, Some(MediumNumber::new(2)))
        .unwrap();

    let load = media_set.create_load(ContainerId::Root, "SPLIT.LUH").unwrap();
    {
        let load_data = media_set.load_mut(load).unwrap();
        load_data.part_number = "LOAD-PN-1".to_string();
        load_data.set_target_hardware_id("FMS-L", vec!["1".to_string()]);
    }
    media_set
        .add_load_data_file(load, data, "DF-PN-1", None)
        .unwrap();
    media_set
        .add_load_support_file(load, support, "SF-PN-1", None)
        .unwrap();

    fs::write(source_dir.join("A.BIN"), vec![0x11u8; 512]).unwrap();
    fs::write(source_dir.join("B.BIN"), vec![0x22u8; 256]).unwrap();
    let mut mapping = FilePathMapping::new();
    mapping.insert(data, source_dir.join("A.BIN"));
    mapping.insert(support, source_dir.join("B.BIN"));

    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::All,
        FileCreationPolicy::All,
    )
    .unwrap();

    // The load header resides on medium 1, the payload is split
    assert!(medium_dir(&root, MediumNumber::new(1)).join("SPLIT.LUH").is_file());
    assert!(medium_dir(&root, MediumNumber::new(1)).join("A.BIN").is_file());
    assert!(medium_dir(&root, MediumNumber::new(2)).join("B.BIN").is_file());
    assert!(!medium_dir(&root, MediumNumber::new(2)).join("A.BIN").exists());

    // Both media list both files, with identical member sequence numbers
    // and CRCs.
    let first =
        FileListFile::decode(&fs::read(medium_dir(&root, MediumNumber::new(1)).join("FILES.LUM")).unwrap())
            .unwrap();
    let second =
        FileListFile::decode(&fs::read(medium_dir(&root, MediumNumber::new(2)).join("FILES.LUM")).unwrap())
            .unwrap();
    assert!(first.belongs_to_same_media_set(&second));

    let payload_entries = |list: &FileListFile| {
        list.files
            .iter()
            .filter(|entry| FileType::from_filename(&entry.filename).is_none())
            .map(|entry| {
                (
                    entry.filename.clone(),
                    entry.member_sequence_number,
                    entry.crc,
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(payload_entries(&first), payload_entries(&second));
    assert!(
        payload_entries(&first)
            .iter()
            .any(|(name, medium, _)| name == "A.BIN" && *medium == MediumNumber::new(1))
    );
    assert!(
        payload_entries(&first)
            .iter()
            .any(|(name, medium, _)| name == "B.BIN" && *medium == MediumNumber::new(2))
    );

    // The probe classifies both media
    let information =
        arinc665_utils::medium_information(&medium_dir(&root, MediumNumber::new(2))).unwrap();
    assert_eq!(information.part_number, "MSET0012345");
    assert_eq!(information.media_sequence_number, MediumNumber::new(2));
    assert_eq!(
        information.number_of_media_set_members,
        MediumNumber::new(2)
    );

    let (decompiled, _) = decompile_media_set(&root, true).unwrap();
    assert_same_structure(&media_set, &decompiled);
}

#[test]
fn test_supplement2_round_trip_with_batches() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let mut media_set = MediaSet::new("MSET0012345");
    media_set.loads_user_defined_data = vec![0xCA, 0xFE];

    let directory = media_set.create_directory(ContainerId::Root, "SW").unwrap();
    let app = media_set
        .create_regular_file(ContainerId::Directory(directory), "APP.BIN")
        .unwrap();
    let load = media_set.create_load(ContainerId::Root, "APP.LUH").unwrap();
    {
        let load_data = media_set.load_mut(load).unwrap();
        load_data.part_number = "LOAD-PN-1".to_string();
        load_data.set_target_hardware_id("FMS-L", Vec::new());
        load_data.set_user_defined_data(vec![0x12, 0x34, 0x56, 0x78]);
    }
    media_set
        .add_load_data_file(load, app, "DF-PN-1", None)
        .unwrap();

    let batch = media_set
        .create_batch(ContainerId::Root, "NIGHTLY.LBP", &batch_part_number())
        .unwrap();
    media_set.batch_mut(batch).unwrap().comment = "Nightly update".to_string();
    media_set.add_batch_load(batch, "FMS-L", load).unwrap();

    fs::write(source_dir.join("APP.BIN"), vec![0x42u8; 1024]).unwrap();
    let mut mapping = FilePathMapping::new();
    mapping.insert(app, source_dir.join("APP.BIN"));

    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement2,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    let medium = medium_dir(&root, MediumNumber::new(1));
    assert!(medium.join("BATCHES.LUM").is_file());
    assert!(medium.join("SW").join("APP.BIN").is_file());

    let (decompiled, _) = decompile_media_set(&root, true).unwrap();
    assert_same_structure(&media_set, &decompiled);
}

#[test]
fn test_check_values_round_trip() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (mut media_set, mapping) = single_medium_set(&source_dir);
    media_set.media_set_check_value_type = Some(CheckValueType::Crc32);
    media_set.files_check_value_type = CheckValueType::Sha256;

    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    let (decompiled, check_values) = decompile_media_set(&root, true).unwrap();
    assert_eq!(
        decompiled.effective_media_set_check_value_type(),
        CheckValueType::Crc32
    );

    // The payload file carries a SHA-256 check value, byte-identical to a
    // locally computed one.
    let app = decompiled.find_file_by_path("APP.BIN").unwrap();
    assert_eq!(
        decompiled.effective_file_check_value_type(app).unwrap(),
        CheckValueType::Sha256
    );
    let payload = fs::read(medium_dir(&root, MediumNumber::new(1)).join("APP.BIN")).unwrap();
    let expected = arinc645::check_value_of(CheckValueType::Sha256, &payload);
    assert!(check_values.get(&app).unwrap().contains(&expected));

    // The load carries a CRC-32 load check value
    let luh = decompiled.find_file_by_path("APP.LUH").unwrap();
    assert!(
        check_values
            .get(&luh)
            .is_some_and(|values| values
                .iter()
                .any(|value| value.check_value_type() == CheckValueType::Crc32))
    );
}

#[test]
fn test_truncated_payload_fails_integrity() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    // Truncate the payload by one byte
    let app = medium_dir(&root, MediumNumber::new(1)).join("APP.BIN");
    let payload = fs::read(&app).unwrap();
    fs::write(&app, &payload[..payload.len() - 1]).unwrap();

    let error = decompile_media_set(&root, true).unwrap_err();
    assert!(
        matches!(&error, Error::IntegrityFailure { file, .. } if file == "APP.BIN"),
        "unexpected error: {error}"
    );

    // Without the integrity pass the model is still produced
    let (decompiled, _) = decompile_media_set(&root, false).unwrap();
    assert_same_structure(&media_set, &decompiled);
}

#[test]
fn test_policy_none_requires_header_source() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    let error = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::None,
        FileCreationPolicy::None,
    )
    .unwrap_err();

    assert!(
        matches!(&error, Error::DanglingReference { to, .. } if to == "APP.LUH"),
        "unexpected error: {error}"
    );
}

#[test]
fn test_existing_output_refused() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    fs::create_dir_all(output_base.join(media_set.part_number())).unwrap();

    let error = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap_err();

    assert!(matches!(error, Error::OutputExists { .. }));
}

#[test]
fn test_progress_and_cancellation() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    let root = output_base.join(media_set.part_number());

    let compiler = MediaSetCompiler::new(
        &media_set,
        &mapping,
        Box::new(|medium, path, raw| {
            fs::write(medium_dir(&root, medium).join(path), raw)?;
            Ok(())
        }),
        Box::new(|medium, path| Ok(fs::read(medium_dir(&root, medium).join(path))?)),
        Box::new(|medium, path| {
            fs::create_dir_all(medium_dir(&root, medium).join(path))?;
            Ok(())
        }),
        Box::new(|source, medium, path| {
            fs::copy(source, medium_dir(&root, medium).join(path))?;
            Ok(())
        }),
    )
    .progress_handler(Box::new(|_info| Err("stop".into())));

    assert!(matches!(compiler.compile(), Err(Error::Cancelled)));
}

#[test]
fn test_recompile_of_decompiled_set_is_stable() {
    init_tracing();
    let workspace = tempfile::tempdir().unwrap();
    let source_dir = workspace.path().join("src");
    let output_base = workspace.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();

    let (media_set, mapping) = single_medium_set(&source_dir);
    let root = compile_media_set(
        &media_set,
        &mapping,
        &output_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    let (decompiled, _) = decompile_media_set(&root, true).unwrap();

    // Re-compile the decompiled model from the first output as source
    let app = decompiled.find_file_by_path("APP.BIN").unwrap();
    let mut second_mapping = FilePathMapping::new();
    second_mapping.insert(
        app,
        medium_dir(&root, MediumNumber::new(1)).join("APP.BIN"),
    );

    let second_base = workspace.path().join("out2");
    let second_root = compile_media_set(
        &decompiled,
        &second_mapping,
        &second_base,
        SupportedArinc665Version::Supplement345,
        FileCreationPolicy::NoneExisting,
        FileCreationPolicy::NoneExisting,
    )
    .unwrap();

    // Both runs produce byte-identical media
    for filename in ["FILES.LUM", "LOADS.LUM", "APP.BIN", "APP.LUH"] {
        let first = fs::read(medium_dir(&root, MediumNumber::new(1)).join(filename)).unwrap();
        let second =
            fs::read(medium_dir(&second_root, MediumNumber::new(1)).join(filename)).unwrap();
        assert_eq!(first, second, "{filename} differs between compile runs");
    }
}
