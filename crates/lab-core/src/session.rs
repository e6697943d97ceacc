//! Interactive session: active table, current view and the capture flow
//!
//! The session is the only holder of the table under review. Edits replace
//! it wholesale, so snapshots handed out earlier (to the archive, to a chart)
//! never change underneath their holders.

use crate::archive::{ArchiveStore, ScanEntry, SessionArchive};
use crate::digitize::{Digitizer, ImagePayload};
use crate::edit::{Edit, EditScript};
use crate::error::{DigitizeError, Error, Result};
use crate::export::{render_csv, render_script, ScriptFlavor};
use crate::series::{derive_series, Plot};
use crate::table::{DigitizationResult, Table};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// The views a front end can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Archive overview and entry point
    Dashboard,
    /// Image capture, digitization in flight
    Capture,
    /// Table review and correction
    Review,
    /// Chart of the numeric series
    Chart,
    /// Export artifacts
    Export,
}

impl View {
    /// Whether the view needs a digitized table to be shown
    pub fn needs_table(self) -> bool {
        matches!(self, View::Review | View::Chart | View::Export)
    }
}

/// Receipt for a capture in flight; completions for an outdated ticket are
/// dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTicket {
    generation: u64,
    image: String,
    started: DateTime<Utc>,
}

/// One user's working session
#[derive(Debug)]
pub struct Session<S: ArchiveStore> {
    archive: SessionArchive<S>,
    view: View,
    table: Table,
    image: Option<String>,
    notes: Option<String>,
    error: Option<String>,
    processing: bool,
    generation: u64,
    default_tag: Option<String>,
}

impl<S: ArchiveStore> Session<S> {
    /// Start on the dashboard with an empty table
    pub fn new(archive: SessionArchive<S>) -> Self {
        Self {
            archive,
            view: View::Dashboard,
            table: Table::new(),
            image: None,
            notes: None,
            error: None,
            processing: false,
            generation: 0,
            default_tag: None,
        }
    }

    /// Tag recorded with every new capture
    pub fn with_default_tag(mut self, tag: Option<String>) -> Self {
        self.default_tag = tag;
        self
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Data URI of the image the active table came from
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Notes the digitizer could not place in the table
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Message of the last failed capture
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn archive(&self) -> &SessionArchive<S> {
        &self.archive
    }

    /// True once a table has been digitized or opened
    pub fn has_table(&self) -> bool {
        self.image.is_some()
    }

    /// Switch views. Returns `false` and stays put when the target view
    /// needs a table and none is loaded.
    ///
    /// Leaving the capture view while a digitization is in flight abandons
    /// it: its result will be discarded when it arrives.
    pub fn navigate(&mut self, view: View) -> bool {
        if view.needs_table() && !self.has_table() {
            return false;
        }
        if self.processing && view != View::Capture {
            self.abandon_capture();
        }
        self.view = view;
        true
    }

    /// Start a capture of `image` (a data URI)
    pub fn begin_capture(&mut self, image: impl Into<String>) -> CaptureTicket {
        if self.processing {
            self.abandon_capture();
        }
        self.generation += 1;
        self.processing = true;
        self.error = None;
        self.view = View::Capture;

        CaptureTicket {
            generation: self.generation,
            image: image.into(),
            started: Utc::now(),
        }
    }

    /// Deliver the digitizer's answer for `ticket`.
    ///
    /// Returns `false` if the capture was abandoned in the meantime, in
    /// which case nothing changes. On success the table is committed,
    /// archived and shown for review; on failure the message is kept and the
    /// dashboard is shown, with the previous table left in place.
    pub fn complete_capture(
        &mut self,
        ticket: CaptureTicket,
        result: std::result::Result<DigitizationResult, DigitizeError>,
    ) -> bool {
        if !self.processing || ticket.generation != self.generation {
            debug!("discarding result of abandoned capture #{}", ticket.generation);
            return false;
        }
        self.processing = false;

        match result {
            Ok(result) => {
                info!(
                    "captured table with {} columns and {} rows",
                    result.table.column_count(),
                    result.table.row_count()
                );
                let entry = ScanEntry::new(
                    result.table.clone(),
                    ticket.image.clone(),
                    self.default_tag.clone(),
                    ticket.started,
                );
                self.archive.record(entry);

                self.table = result.table;
                self.notes = result.notes;
                self.image = Some(ticket.image);
                self.view = View::Review;
            }
            Err(e) => {
                warn!("capture failed: {}", e);
                self.error = Some(e.to_string());
                self.view = View::Dashboard;
            }
        }
        true
    }

    /// Digitize `image` and deliver the result in one step
    pub async fn capture<D: Digitizer>(&mut self, digitizer: &D, image: &ImagePayload) -> bool {
        let ticket = self.begin_capture(image.to_data_uri());
        let result = digitizer.digitize(image).await;
        self.complete_capture(ticket, result)
    }

    /// Like [`Session::capture`], but a failed digitization comes back as an
    /// error as well as being kept as the session's message
    pub async fn try_capture<D: Digitizer>(&mut self, digitizer: &D, image: &ImagePayload) -> Result<()> {
        let ticket = self.begin_capture(image.to_data_uri());
        let result = digitizer.digitize(image).await;
        let failure = result.as_ref().err().cloned();
        self.complete_capture(ticket, result);

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Open the newest archived scan
    pub fn open_latest(&mut self) -> Result<()> {
        let id = self
            .archive
            .latest()
            .map(|e| e.id.clone())
            .ok_or(Error::EmptyArchive)?;
        self.open_entry(&id)
    }

    /// Make a copy of an archived scan the active table
    pub fn open_entry(&mut self, id: &str) -> Result<()> {
        let (table, image) = self.archive.load(id)?;
        if self.processing {
            self.abandon_capture();
        }
        self.table = table;
        self.image = Some(image);
        self.notes = None;
        self.error = None;
        self.view = View::Review;
        Ok(())
    }

    /// Apply an edit to the active table.
    ///
    /// The edit is checked first; a misaddressed edit leaves the table as is.
    pub fn apply(&mut self, edit: &Edit) -> Result<()> {
        self.table = edit.try_apply(&self.table)?;
        Ok(())
    }

    /// Apply a whole edit script; the table only changes if every edit fits
    pub fn apply_script(&mut self, script: &EditScript) -> Result<()> {
        self.table = script.apply(&self.table)?;
        Ok(())
    }

    /// Archive the active table as a new entry; the archive is append-only,
    /// so the entry it was opened from stays as it was
    pub fn save_current(&mut self, tag: Option<String>) -> Option<&ScanEntry> {
        let image = self.image.clone()?;
        let tag = tag.or_else(|| self.default_tag.clone());
        self.archive
            .record(ScanEntry::new(self.table.clone(), image, tag, Utc::now()));
        self.archive.latest()
    }

    /// Back to the dashboard with nothing loaded
    pub fn reset(&mut self) {
        if self.processing {
            self.abandon_capture();
        }
        self.view = View::Dashboard;
        self.table = Table::new();
        self.image = None;
        self.notes = None;
        self.error = None;
    }

    /// Chart data for the active table
    pub fn plot(&self) -> Plot {
        derive_series(&self.table)
    }

    /// Delimited-text export of the active table
    pub fn csv(&self) -> String {
        render_csv(&self.table)
    }

    /// Analysis script for the active table
    pub fn script(&self, flavor: ScriptFlavor) -> String {
        render_script(&self.table, flavor)
    }

    fn abandon_capture(&mut self) {
        debug!("abandoning capture #{}", self.generation);
        self.processing = false;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryStore;
    use crate::table::CellValue;

    struct FixedDigitizer(std::result::Result<DigitizationResult, DigitizeError>);

    impl Digitizer for FixedDigitizer {
        async fn digitize(
            &self,
            _image: &ImagePayload,
        ) -> std::result::Result<DigitizationResult, DigitizeError> {
            self.0.clone()
        }
    }

    fn result() -> DigitizationResult {
        DigitizationResult {
            table: Table::from_parts(
                vec!["Time (s)".to_string(), "Voltage (V)".to_string()],
                vec![
                    [("Time (s)", CellValue::Number(2.0)), ("Voltage (V)", CellValue::Number(5.0))]
                        .into_iter()
                        .collect(),
                    [("Time (s)", CellValue::Number(1.0)), ("Voltage (V)", CellValue::Number(3.0))]
                        .into_iter()
                        .collect(),
                ],
            ),
            notes: Some("room temperature".to_string()),
        }
    }

    fn session() -> Session<MemoryStore> {
        Session::new(SessionArchive::open(MemoryStore::new()))
    }

    fn image() -> ImagePayload {
        ImagePayload::new("image/png", vec![1, 2, 3])
    }

    #[test]
    fn test_navigation_gated_on_table() {
        let mut s = session();
        assert!(!s.navigate(View::Review));
        assert!(!s.navigate(View::Chart));
        assert!(!s.navigate(View::Export));
        assert_eq!(s.view(), View::Dashboard);
        assert!(s.navigate(View::Capture));
    }

    #[tokio::test]
    async fn test_successful_capture() {
        let mut s = session().with_default_tag(Some("TP 4".to_string()));
        assert!(s.capture(&FixedDigitizer(Ok(result())), &image()).await);

        assert_eq!(s.view(), View::Review);
        assert_eq!(s.table(), &result().table);
        assert_eq!(s.notes(), Some("room temperature"));
        assert_eq!(s.image(), Some("data:image/png;base64,AQID"));
        assert_eq!(s.archive().len(), 1);
        assert_eq!(s.archive().latest().unwrap().tag.as_deref(), Some("TP 4"));
        assert!(s.navigate(View::Chart));
    }

    #[tokio::test]
    async fn test_failed_capture_commits_nothing() {
        let mut s = session();
        let ok = s
            .capture(&FixedDigitizer(Err(DigitizeError::NoTable)), &image())
            .await;

        assert!(ok);
        assert_eq!(s.view(), View::Dashboard);
        assert_eq!(s.error(), Some("no table was detected in the image"));
        assert!(s.table().is_empty());
        assert!(!s.has_table());
        assert!(s.archive().is_empty());
    }

    #[tokio::test]
    async fn test_try_capture_returns_failure() {
        let mut s = session();
        let err = s
            .try_capture(&FixedDigitizer(Err(DigitizeError::NoTable)), &image())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Digitize(DigitizeError::NoTable)));
        assert_eq!(s.error(), Some("no table was detected in the image"));
        assert!(s.archive().is_empty());

        s.try_capture(&FixedDigitizer(Ok(result())), &image()).await.unwrap();
        assert_eq!(s.view(), View::Review);
        assert_eq!(s.archive().len(), 1);
    }

    #[test]
    fn test_abandoned_capture_is_discarded() {
        let mut s = session();
        let ticket = s.begin_capture("data:image/png;base64,AQID");
        assert!(s.is_processing());

        assert!(s.navigate(View::Dashboard));
        assert!(!s.is_processing());

        assert!(!s.complete_capture(ticket, Ok(result())));
        assert!(s.table().is_empty());
        assert!(s.archive().is_empty());
    }

    #[test]
    fn test_superseded_capture_is_discarded() {
        let mut s = session();
        let first = s.begin_capture("data:a");
        let second = s.begin_capture("data:b");

        assert!(!s.complete_capture(first, Ok(result())));
        assert!(s.complete_capture(second, Ok(result())));
        assert_eq!(s.image(), Some("data:b"));
    }

    #[test]
    fn test_edits_replace_table() {
        let mut s = session();
        let ticket = s.begin_capture("data:x");
        s.complete_capture(ticket, Ok(result()));
        let before = s.table().clone();

        s.apply(&Edit::set_cell(0, "Time (s)", "4")).unwrap();
        assert_eq!(s.table().cell_text(0, "Time (s)"), "4");
        assert_eq!(before.cell_text(0, "Time (s)"), "2");
        // archived snapshot is unaffected
        assert_eq!(s.archive().latest().unwrap().table, before);

        assert!(s.apply(&Edit::RemoveRow { index: 9 }).is_err());
        assert_eq!(s.table().row_count(), 2);
    }

    #[test]
    fn test_open_entry_and_save_current() {
        let mut s = session();
        let ticket = s.begin_capture("data:x");
        s.complete_capture(ticket, Ok(result()));
        let id = s.archive().latest().unwrap().id.clone();

        s.reset();
        assert!(!s.has_table());

        s.open_entry(&id).unwrap();
        assert_eq!(s.view(), View::Review);
        s.apply(&Edit::AppendRow).unwrap();

        let saved = s.save_current(Some("corrected".to_string())).unwrap();
        assert_eq!(saved.table.row_count(), 3);
        assert_eq!(s.archive().len(), 2);
        assert_eq!(s.archive().find(&id).unwrap().table.row_count(), 2);

        assert!(s.open_entry("missing").is_err());
    }

    #[test]
    fn test_open_latest() {
        let mut s = session();
        assert!(matches!(s.open_latest(), Err(Error::EmptyArchive)));

        let ticket = s.begin_capture("data:x");
        s.complete_capture(ticket, Ok(result()));
        s.reset();

        s.open_latest().unwrap();
        assert_eq!(s.table(), &result().table);
        assert_eq!(s.image(), Some("data:x"));
    }

    #[test]
    fn test_apply_script_is_all_or_nothing() {
        let mut s = session();
        let ticket = s.begin_capture("data:x");
        s.complete_capture(ticket, Ok(result()));

        let mut script = EditScript::new();
        script.add_edit(Edit::AppendRow);
        script.add_edit(Edit::RemoveColumn { index: 5 });

        let err = s.apply_script(&script).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid edit: edit #2: column index 5 out of range (2 columns)"
        );
        assert_eq!(s.table().row_count(), 2);

        script.edits.pop();
        s.apply_script(&script).unwrap();
        assert_eq!(s.table().row_count(), 3);
    }

    #[test]
    fn test_renderers_follow_active_table() {
        let mut s = session();
        assert_eq!(s.plot(), Plot::NoData);
        assert_eq!(s.csv(), "");

        let ticket = s.begin_capture("data:x");
        s.complete_capture(ticket, Ok(result()));
        assert_eq!(s.plot().series().unwrap().x_values(), vec![1.0, 2.0]);
        assert!(s.csv().starts_with("Time (s),Voltage (V)\n\"2\",\"5\""));
        assert!(s.script(ScriptFlavor::Numpy).contains("time__s_ = np.array([2, 1])"));
    }
}
