//! The export pipeline: per-document decisions, the dual-format transfer,
//! and timestamp stamping.
//!
//! [`export_all`] walks the filtered leaves strictly one at a time in tree
//! order. Each leaf is classified against the local disk state, transferred
//! when the classification asks for it, and stamped with the device's
//! modification time so later runs can compare clocks. The first failure
//! aborts the whole run; everything written by earlier leaves stays on
//! disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::contract::DeviceClient;
use crate::document::{DocumentNode, DocumentTree};
use crate::error::ExportError;
use crate::filter::{self, FilterCriteria};

/// Folder label announced for leaves that sit directly in the device root.
pub const ROOT_FOLDER_LABEL: &str = "<reMarkable document root>";

/// Run configuration for one export pass.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Local folder the device hierarchy is mirrored into.
    pub target_dir: PathBuf,
    pub criteria: FilterCriteria,
    /// Re-export documents whose device copy is newer. Without this an
    /// existing export is never touched, regardless of age.
    pub update_existing: bool,
}

/// Signed seconds between local wall-clock time and UTC, sampled once at
/// run start so every comparison and stamp in the run uses the same value.
///
/// Device timestamps are UTC; local file times are compared in local
/// wall-clock seconds, so remote values are shifted by this offset first.
#[derive(Debug, Clone, Copy)]
pub struct UtcOffset(i64);

impl UtcOffset {
    /// The current machine's offset from UTC.
    pub fn sample_local() -> Self {
        Self(i64::from(chrono::Local::now().offset().local_minus_utc()))
    }

    pub fn new(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> i64 {
        self.0
    }

    /// A remote UTC timestamp shifted into local wall-clock seconds.
    pub fn adjust(self, remote_timestamp: i64) -> i64 {
        remote_timestamp + self.0
    }
}

/// Cooperative stop signal, checked between leaves only so a half-written
/// document pair is never left behind by a cancellation.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-leaf classification. Drives I/O and the run report, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No local file yet.
    Export,
    /// A local file exists but the device copy is newer; handled exactly
    /// like [`Decision::Export`].
    Update,
    /// A local file exists and updating was not requested.
    SkipExists,
    /// A local file exists and is at least as new as the device copy.
    SkipUpToDate,
}

impl Decision {
    /// Whether the decision leads to a transfer.
    pub fn is_transfer(self) -> bool {
        matches!(self, Decision::Export | Decision::Update)
    }
}

/// One visited leaf in the run report.
#[derive(Debug, Clone)]
pub struct ExportEntry {
    /// 1-based position in the filtered sequence.
    pub index: usize,
    pub name: String,
    /// Remote path of the document.
    pub path: String,
    /// The `.pdf` half of the local target pair.
    pub target: PathBuf,
    pub decision: Decision,
}

/// What a completed run did, one entry per filtered leaf in visit order.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Number of leaves that survived the filters.
    pub total: usize,
    pub entries: Vec<ExportEntry>,
}

impl ExportReport {
    pub fn exported(&self) -> usize {
        self.count(Decision::Export)
    }

    pub fn updated(&self) -> usize {
        self.count(Decision::Update)
    }

    pub fn skipped(&self) -> usize {
        self.count(Decision::SkipExists) + self.count(Decision::SkipUpToDate)
    }

    fn count(&self, decision: Decision) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.decision == decision)
            .count()
    }
}

/// The two sibling local paths a document is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPair {
    pub pdf: PathBuf,
    pub rmdoc: PathBuf,
}

impl TargetPair {
    /// Joins the output root with the document's remote path, forces a
    /// `.pdf` suffix when the name lacks one (case-sensitive, so `Scan.PDF`
    /// becomes `Scan.PDF.pdf`), and derives the sibling `.rmdoc` path from
    /// the shared base name.
    pub fn for_document(doc: &DocumentNode, target_dir: &Path) -> Self {
        let located = doc.local_path(target_dir);
        let dir = located
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = doc.name.strip_suffix(".pdf").unwrap_or(&doc.name);
        Self {
            pdf: dir.join(format!("{base}.pdf")),
            rmdoc: dir.join(format!("{base}.rmdoc")),
        }
    }
}

/// Classifies one leaf against the local disk. Only the `.pdf` half is
/// consulted; a stray `.rmdoc` without its sibling counts as absent.
fn decide(pdf: &Path, update_existing: bool, adjusted_remote: i64) -> io::Result<Decision> {
    if !pdf.exists() {
        return Ok(Decision::Export);
    }
    if !update_existing {
        return Ok(Decision::SkipExists);
    }
    if file_mtime_seconds(pdf)? < adjusted_remote {
        Ok(Decision::Update)
    } else {
        Ok(Decision::SkipUpToDate)
    }
}

/// Whole seconds since the Unix epoch of a file's mtime, truncated to match
/// the resolution of the device clock.
fn file_mtime_seconds(path: &Path) -> io::Result<i64> {
    Ok(unix_seconds(fs::metadata(path)?.modified()?))
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}

fn system_time_from_unix(seconds: i64) -> SystemTime {
    if seconds >= 0 {
        UNIX_EPOCH + Duration::from_secs(seconds as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
    }
}

/// Stamps mtime and atime with the adjusted device timestamp. Later runs
/// compare exactly this value against the device clock.
fn sync_file_times(path: &Path, unix_secs: i64) -> io::Result<()> {
    let stamp = system_time_from_unix(unix_secs);
    let times = fs::FileTimes::new()
        .set_accessed(stamp)
        .set_modified(stamp);
    fs::File::options().write(true).open(path)?.set_times(times)
}

/// Runs the full pipeline: filter, decide, transfer, stamp.
///
/// Returns a report with one entry per filtered leaf, or the error of the
/// first leaf that failed.
pub async fn export_all<C>(
    client: &C,
    tree: &DocumentTree,
    config: &ExportConfig,
    offset: UtcOffset,
    interrupt: &InterruptFlag,
) -> Result<ExportReport, ExportError>
where
    C: DeviceClient + ?Sized,
{
    let leaves = filter::exportable_leaves(tree, &config.criteria);
    let total = leaves.len();
    let mut report = ExportReport {
        total,
        entries: Vec::with_capacity(total),
    };
    let mut last_folder: Option<Option<String>> = None;

    for (position, doc) in leaves.into_iter().enumerate() {
        if interrupt.is_triggered() {
            info!("Stopping between documents on user interrupt");
            return Err(ExportError::Interrupted);
        }
        let index = position + 1;

        let folder = doc.parent_folder().map(str::to_owned);
        if last_folder.as_ref() != Some(&folder) {
            info!(
                folder = folder.as_deref().unwrap_or(ROOT_FOLDER_LABEL),
                "Current folder"
            );
            last_folder = Some(folder);
        }

        let target = TargetPair::for_document(doc, &config.target_dir);
        if let Some(parent) = target.pdf.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                error!(path = %parent.display(), "Failed to create directories");
                ExportError::DirectoryCreation {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let adjusted = offset.adjust(doc.modified_timestamp);
        let decision = decide(&target.pdf, config.update_existing, adjusted)?;

        match decision {
            Decision::Export => info!(index, total, name = %doc.name, "Exporting document"),
            Decision::Update => info!(index, total, name = %doc.name, "Updating outdated export"),
            Decision::SkipExists => {
                info!(index, total, name = %doc.name, "Skipping document, already in the target folder")
            }
            Decision::SkipUpToDate => {
                warn!(index, total, name = %doc.name, "Skipping document, local copy is up to date")
            }
        }

        if decision.is_transfer() {
            transfer(client, doc, &target).await?;
            stamp_pair(&target, adjusted)?;
        }

        report.entries.push(ExportEntry {
            index,
            name: doc.name.clone(),
            path: doc.path().to_owned(),
            target: target.pdf.clone(),
            decision,
        });
    }

    Ok(report)
}

/// Writes both representations, archive first. When the second transfer
/// fails the already-written `.rmdoc` stays on disk.
async fn transfer<C>(client: &C, doc: &DocumentNode, target: &TargetPair) -> Result<(), ExportError>
where
    C: DeviceClient + ?Sized,
{
    for dest in [&target.rmdoc, &target.pdf] {
        if let Err(source) = client.export_doc(doc, dest).await {
            error!(name = %doc.name, target = %dest.display(), "Transfer from device failed");
            return Err(ExportError::Transfer {
                name: doc.name.clone(),
                target: dest.clone(),
                source,
            });
        }
    }
    Ok(())
}

fn stamp_pair(target: &TargetPair, adjusted: i64) -> Result<(), ExportError> {
    for path in [&target.pdf, &target.rmdoc] {
        sync_file_times(path, adjusted).map_err(|source| {
            error!(path = %path.display(), "Failed to change timestamp on exported file");
            ExportError::TimestampSync {
                path: path.clone(),
                source,
            }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> DocumentNode {
        DocumentNode::document("id", name, 0)
    }

    #[test]
    fn target_pair_appends_pdf_suffix_when_missing() {
        let tree = DocumentTree::new(vec![leaf("Notes")]);
        let doc = tree.iter().next().unwrap();
        let pair = TargetPair::for_document(doc, Path::new("/out"));
        assert_eq!(pair.pdf, PathBuf::from("/out/Notes.pdf"));
        assert_eq!(pair.rmdoc, PathBuf::from("/out/Notes.rmdoc"));
    }

    #[test]
    fn target_pair_keeps_an_existing_pdf_suffix() {
        let tree = DocumentTree::new(vec![leaf("Contract.pdf")]);
        let doc = tree.iter().next().unwrap();
        let pair = TargetPair::for_document(doc, Path::new("/out"));
        assert_eq!(pair.pdf, PathBuf::from("/out/Contract.pdf"));
        assert_eq!(pair.rmdoc, PathBuf::from("/out/Contract.rmdoc"));
    }

    #[test]
    fn target_pair_suffix_check_is_case_sensitive() {
        let tree = DocumentTree::new(vec![leaf("Scan.PDF")]);
        let doc = tree.iter().next().unwrap();
        let pair = TargetPair::for_document(doc, Path::new("/out"));
        assert_eq!(pair.pdf, PathBuf::from("/out/Scan.PDF.pdf"));
        assert_eq!(pair.rmdoc, PathBuf::from("/out/Scan.PDF.rmdoc"));
    }

    #[test]
    fn target_pair_mirrors_the_folder_hierarchy() {
        let tree = DocumentTree::new(vec![DocumentNode::folder(
            "f",
            "Work",
            vec![DocumentNode::folder(
                "g",
                "Projects",
                vec![leaf("Roadmap")],
            )],
        )]);
        let doc = tree.iter().find(|node| !node.is_folder).unwrap();
        let pair = TargetPair::for_document(doc, Path::new("/out"));
        let expected: PathBuf = ["/out", "Work", "Projects", "Roadmap.pdf"].iter().collect();
        assert_eq!(pair.pdf, expected);
    }

    #[test]
    fn missing_local_file_means_export() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Notes.pdf");
        assert_eq!(decide(&pdf, false, 1_000).unwrap(), Decision::Export);
        assert_eq!(decide(&pdf, true, 1_000).unwrap(), Decision::Export);
    }

    #[test]
    fn existing_file_without_update_is_skipped_unconditionally() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Notes.pdf");
        fs::write(&pdf, b"old").unwrap();
        sync_file_times(&pdf, 100).unwrap();
        // Device copy is far newer, but updating was not requested.
        assert_eq!(decide(&pdf, false, 1_000_000).unwrap(), Decision::SkipExists);
    }

    #[test]
    fn update_reexports_only_strictly_older_files() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Notes.pdf");
        fs::write(&pdf, b"old").unwrap();
        sync_file_times(&pdf, 1_000).unwrap();

        assert_eq!(decide(&pdf, true, 1_001).unwrap(), Decision::Update);
        assert_eq!(decide(&pdf, true, 1_000).unwrap(), Decision::SkipUpToDate);
        assert_eq!(decide(&pdf, true, 999).unwrap(), Decision::SkipUpToDate);
    }

    #[test]
    fn sync_file_times_sets_the_mtime_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stamped.pdf");
        fs::write(&file, b"contents").unwrap();
        sync_file_times(&file, 1_700_000_000).unwrap();
        assert_eq!(file_mtime_seconds(&file).unwrap(), 1_700_000_000);
    }

    #[test]
    fn unix_seconds_round_trips_through_system_time() {
        for seconds in [0_i64, 1, 1_700_000_000, -1, -86_400] {
            assert_eq!(unix_seconds(system_time_from_unix(seconds)), seconds);
        }
    }

    #[test]
    fn offset_shifts_remote_timestamps_both_ways() {
        assert_eq!(UtcOffset::new(3_600).adjust(1_000), 4_600);
        assert_eq!(UtcOffset::new(-7_200).adjust(1_000), -6_200);
        assert_eq!(UtcOffset::new(0).adjust(1_000), 1_000);
    }

    #[test]
    fn interrupt_flag_latches() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_triggered());
        let observer = flag.clone();
        flag.trigger();
        assert!(observer.is_triggered());
    }

    #[test]
    fn report_counts_group_decisions() {
        let entry = |decision| ExportEntry {
            index: 1,
            name: "n".into(),
            path: "n".into(),
            target: PathBuf::from("n.pdf"),
            decision,
        };
        let report = ExportReport {
            total: 4,
            entries: vec![
                entry(Decision::Export),
                entry(Decision::Update),
                entry(Decision::SkipExists),
                entry(Decision::SkipUpToDate),
            ],
        };
        assert_eq!(report.exported(), 1);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.skipped(), 2);
    }
}
