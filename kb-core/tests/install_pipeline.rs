#![cfg(unix)]

use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use kb_common::config::Config;
use kb_common::history;
use kb_common::keg::RECEIPT_FILENAME;
use kb_common::model::{Checksum, ChecksumAlgorithm};
use kb_common::{FormulaRecord, KbError};
use kb_core::{install_formula, InstallOptions, InstallReceipt};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use url::Url;

struct Fixture {
    root: TempDir,
    config: Config,
    formula: FormulaRecord,
    tarball: PathBuf,
}

impl Fixture {
    /// A kb root with the latest kanabo formula pointing at a local tarball and
    /// a stand-in `make` first on the build PATH.
    fn new(make_body: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path().join("kb"));

        let tarball = root.path().join("kanabo-0.2.0.tar.gz");
        write_tarball(&tarball);

        let mut formula = history::latest().unwrap();
        formula.url = Url::from_file_path(&tarball).unwrap().to_string();

        std::fs::create_dir_all(config.bin_dir()).unwrap();
        let make = config.bin_dir().join("make");
        std::fs::write(&make, format!("#!/bin/sh\n{make_body}\n")).unwrap();
        std::fs::set_permissions(&make, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            root,
            config,
            formula,
            tarball,
        }
    }

    fn prefix(&self) -> PathBuf {
        self.root.path().join("opt/kanabo")
    }

    fn install_dependencies(&self) {
        for (name, version) in [("check", "0.15.2"), ("libyaml", "0.2.5")] {
            std::fs::create_dir_all(self.config.formula_keg_path(name, version)).unwrap();
        }
    }

    fn options(&self) -> InstallOptions {
        InstallOptions {
            prefix: Some(self.prefix()),
            cc: Some("cc".to_string()),
            ..Default::default()
        }
    }
}

fn write_tarball(path: &Path) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let makefile = "install:\n\t@true\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(makefile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "kanabo-kanabo-0.2.0/Makefile", makefile.as_bytes())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

/// Records its arguments and populates `<prefix>/bin` like a real install.
fn recording_make(log: &Path) -> String {
    format!(
        r#"echo "$@" > '{log}'
test -f Makefile || exit 9
for arg in "$@"; do
  case "$arg" in
    prefix=*) dest="${{arg#prefix=}}" ;;
  esac
done
mkdir -p "$dest/bin" && touch "$dest/bin/kanabo""#,
        log = log.display()
    )
}

#[tokio::test]
async fn installs_latest_snapshot_with_lowercase_prefix() {
    let log_dir = tempfile::tempdir().unwrap();
    let log = log_dir.path().join("args.txt");
    let fixture = Fixture::new(&recording_make(&log));
    fixture.install_dependencies();

    let outcome = install_formula(&fixture.formula, &fixture.config, &fixture.options())
        .await
        .unwrap();

    let prefix = fixture.prefix();
    let expected = format!("prefix={} CC=cc install", prefix.display());
    assert_eq!(std::fs::read_to_string(&log).unwrap().trim(), expected);
    assert_eq!(outcome.command.to_string(), format!("make {expected}"));
    assert!(prefix.join("bin/kanabo").is_file());
    assert!(!outcome.integrity_verified);

    let receipt = InstallReceipt::read_from(&prefix).await.unwrap();
    assert_eq!(receipt.name, "kanabo");
    assert_eq!(receipt.version.to_string(), "0.2.0");
    assert_eq!(receipt.command, outcome.command);
    assert!(!receipt.integrity_verified);
    assert_eq!(receipt.dependencies.len(), 2);
}

#[tokio::test]
async fn checksum_is_verified_when_present() {
    let log_dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(&recording_make(&log_dir.path().join("args.txt")));
    fixture.install_dependencies();

    let mut formula = fixture.formula.clone();
    let bytes = std::fs::read(&fixture.tarball).unwrap();
    formula.checksum = Some(Checksum::sha1(&ChecksumAlgorithm::Sha1.hex_digest(&bytes)).unwrap());

    let outcome = install_formula(&formula, &fixture.config, &fixture.options())
        .await
        .unwrap();
    assert!(outcome.integrity_verified);
    let receipt = outcome.receipt.unwrap();
    assert_eq!(receipt.checksum, formula.checksum);
}

#[tokio::test]
async fn checksum_mismatch_stops_before_install() {
    let log_dir = tempfile::tempdir().unwrap();
    let log = log_dir.path().join("args.txt");
    let fixture = Fixture::new(&recording_make(&log));
    fixture.install_dependencies();

    let mut formula = fixture.formula.clone();
    formula.checksum = Some(Checksum::sha1(&"0".repeat(40)).unwrap());

    let err = install_formula(&formula, &fixture.config, &fixture.options())
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::Integrity { .. }), "{err:?}");
    assert!(!log.exists());
    assert!(!fixture.prefix().exists());
}

#[tokio::test]
async fn failing_install_command_reports_status_and_cleans_up() {
    let fixture = Fixture::new("mkdir -p \"${1#prefix=}/lib\"\nexit 2");
    fixture.install_dependencies();

    let err = install_formula(&fixture.formula, &fixture.config, &fixture.options())
        .await
        .unwrap_err();
    match err {
        KbError::Install { code, command } => {
            assert_eq!(code, Some(2));
            assert!(command.starts_with("make prefix="), "{command}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!fixture.prefix().join(RECEIPT_FILENAME).exists());
    assert!(!fixture.prefix().exists());
}

#[tokio::test]
async fn missing_dependencies_fail_before_running_make() {
    let log_dir = tempfile::tempdir().unwrap();
    let log = log_dir.path().join("args.txt");
    let fixture = Fixture::new(&recording_make(&log));

    let err = install_formula(&fixture.formula, &fixture.config, &fixture.options())
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::Dependency(_)), "{err:?}");
    assert!(!log.exists());

    let options = InstallOptions {
        ignore_dependencies: true,
        ..fixture.options()
    };
    install_formula(&fixture.formula, &fixture.config, &options)
        .await
        .unwrap();
    assert!(log.exists());
}

#[tokio::test]
async fn installing_twice_into_the_same_prefix_is_refused() {
    let log_dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(&recording_make(&log_dir.path().join("args.txt")));
    fixture.install_dependencies();

    install_formula(&fixture.formula, &fixture.config, &fixture.options())
        .await
        .unwrap();
    let err = install_formula(&fixture.formula, &fixture.config, &fixture.options())
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::Validation(_)));
    assert!(fixture.prefix().join(RECEIPT_FILENAME).is_file());
}
