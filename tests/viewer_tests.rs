//! Viewer integration tests: upload, repaint, edit, delete and export

use std::sync::Arc;
use tei_viewer::config::Settings;
use tei_viewer::export::ExportFormat;
use tei_viewer::models::{Level, NewRecord};
use tei_viewer::table::{TableAction, TableMenu, ViewState};
use tei_viewer::transform::Pipeline;
use tei_viewer::upload::UploadFile;
use tei_viewer::viewer::Layout;
use tei_viewer::{RecordStore, TeiViewerError, Viewer};

fn tei(title: &str, author: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt><title>{}</title><author>{}</author></titleStmt>
      <sourceDesc><bibl>Folio</bibl></sourceDesc>
    </fileDesc>
  </teiHeader>
  <text><body><p>...</p></body></text>
</TEI>"#,
        title, author
    )
}

fn viewer_with(settings: Settings) -> Viewer {
    let mut viewer = Viewer::new(
        Arc::new(RecordStore::memory()),
        settings,
        Pipeline::new(None),
    );
    viewer.load_transform(Layout::Table).unwrap();
    viewer
}

fn viewer() -> Viewer {
    viewer_with(Settings::default())
}

fn xml_file(name: &str, title: &str) -> UploadFile {
    UploadFile::new(name, "text/xml", tei(title, "Shakespeare"))
}

fn visible_labels(viewer: &Viewer) -> Vec<String> {
    viewer.view().columns.into_iter().map(|c| c.label).collect()
}

#[test]
fn test_upload_populates_table() {
    let mut viewer = viewer();
    let report = viewer.upload(vec![xml_file("hamlet.xml", "Hamlet"), xml_file("lear.xml", "King Lear")]);
    assert!(report.is_success());

    let view = viewer.view();
    assert_eq!(viewer.controller().view_state(), ViewState::Populated);
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.columns[0].label, "Title");
    assert_eq!(view.rows[0].cells[0], "Hamlet");
    assert_eq!(view.rows[0].cells[1], "Shakespeare");
    assert_eq!(view.rows[1].index, 2);
}

#[test]
fn test_plain_text_upload_is_warned_and_skipped() {
    let mut viewer = viewer();
    let report = viewer.upload(vec![UploadFile::new("notes.txt", "text/plain", "hello")]);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(viewer.store().count().unwrap(), 0);

    let notifications = viewer.take_notifications();
    assert!(notifications
        .iter()
        .any(|n| n.level == Level::Warning && n.message == "notes.txt is not a valid XML file"));
    assert_eq!(viewer.controller().view_state(), ViewState::Uninitialized);
}

#[test]
fn test_hide_then_show_restores_columns() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A")]);
    let before = visible_labels(&viewer);

    viewer.dispatch(TableAction::HideColumn(1)).unwrap();
    assert!(!visible_labels(&viewer).contains(&"Author".to_string()));
    assert!(matches!(viewer.menus().show, TableMenu::Items(_)));

    viewer.dispatch(TableAction::ShowColumn(1)).unwrap();
    assert_eq!(visible_labels(&viewer), before);
    assert_eq!(
        viewer.menus().show,
        TableMenu::Placeholder("Nothing to show".to_string())
    );
}

#[test]
fn test_hidden_columns_survive_repaint() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A")]);
    viewer.dispatch(TableAction::HideColumn(0)).unwrap();

    viewer.upload(vec![xml_file("b.xml", "B")]);
    assert!(!visible_labels(&viewer).contains(&"Title".to_string()));
    assert_eq!(viewer.view().rows.len(), 2);
}

#[test]
fn test_malformed_record_keeps_last_good_table() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A"), xml_file("b.xml", "B")]);
    viewer.take_notifications();
    let good = viewer.view();

    viewer
        .store()
        .add(NewRecord::new("broken.xml", "<TEI><teiHeader>"))
        .unwrap();

    let err = viewer.refresh().unwrap_err();
    assert!(matches!(err, TeiViewerError::Parse(_)));
    assert_eq!(viewer.controller().view_state(), ViewState::Populated);
    assert_eq!(viewer.view(), good);

    let notifications = viewer.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, Level::Danger);
}

#[test]
fn test_paging_requeries_store() {
    let mut settings = Settings::default();
    settings.records_per_page = 2;
    let mut viewer = viewer_with(settings);

    let files: Vec<UploadFile> = (1..=5)
        .map(|i| xml_file(&format!("{}.xml", i), &format!("Play {}", i)))
        .collect();
    viewer.upload(files);

    assert_eq!(viewer.view().pagination.summary(), "Showing 1 to 2 of 5 entries");

    viewer.dispatch(TableAction::NextPage).unwrap();
    let view = viewer.view();
    assert_eq!(view.rows[0].cells[0], "Play 3");
    assert_eq!(view.rows[0].index, 3);

    viewer.dispatch(TableAction::SetPage(10)).unwrap();
    let view = viewer.view();
    assert_eq!(view.pagination.page, 2);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].cells[0], "Play 5");

    viewer.dispatch(TableAction::SetRecordsPerPage(10)).unwrap();
    assert_eq!(viewer.view().rows.len(), 5);
    assert_eq!(viewer.settings().records_per_page, 10);
}

#[test]
fn test_sort_is_page_local() {
    let mut viewer = viewer();
    viewer.upload(vec![
        xml_file("b.xml", "Beta"),
        xml_file("a.xml", "alpha"),
        xml_file("c.xml", "Gamma"),
    ]);

    viewer
        .dispatch(TableAction::SortBy { column: 0, descending: false })
        .unwrap();
    let titles: Vec<String> = viewer.view().rows.into_iter().map(|r| r.cells[0].clone()).collect();
    assert_eq!(titles, vec!["alpha", "Beta", "Gamma"]);

    viewer
        .dispatch(TableAction::SortBy { column: 0, descending: true })
        .unwrap();
    assert_eq!(viewer.view().rows[0].cells[0], "Gamma");
}

#[test]
fn test_delete_selected() {
    let mut viewer = viewer();
    let report = viewer.upload(vec![
        xml_file("a.xml", "A"),
        xml_file("b.xml", "B"),
        xml_file("c.xml", "C"),
    ]);
    let ids = report.succeeded;

    viewer.dispatch(TableAction::Select(ids[0])).unwrap();
    viewer.dispatch(TableAction::Select(ids[2])).unwrap();
    let report = viewer.delete_selected();

    assert_eq!(report.succeeded, vec![ids[0], ids[2]]);
    assert_eq!(viewer.store().count().unwrap(), 1);
    assert_eq!(viewer.view().rows[0].id, ids[1]);
    assert!(viewer.controller().selected_ids().is_empty());
}

#[test]
fn test_delete_selected_without_selection() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A")]);
    viewer.take_notifications();

    let report = viewer.delete_selected();
    assert_eq!(report.total(), 0);
    assert_eq!(viewer.notifications()[0].level, Level::Info);
    assert_eq!(viewer.store().count().unwrap(), 1);
}

#[test]
fn test_delete_all_returns_to_upload() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A"), xml_file("b.xml", "B")]);

    let report = viewer.delete_all();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(viewer.store().count().unwrap(), 0);
    assert_eq!(viewer.controller().view_state(), ViewState::Uninitialized);
    assert_eq!(viewer.route().unwrap().path(), "/upload");
}

#[test]
fn test_edit_repaints_only_that_row() {
    let mut viewer = viewer();
    let ids = viewer
        .upload(vec![xml_file("a.xml", "A"), xml_file("b.xml", "B")])
        .succeeded;

    let mut session = viewer.open_editor(ids[1]).unwrap();
    assert_eq!(session.title(), "Editing b.xml");
    assert_eq!(
        viewer.controller().view_state(),
        ViewState::Editing { record_id: ids[1] }
    );

    session.set_text(tei("B revised", "Fletcher"));
    viewer.save_editor(&session).unwrap();

    assert_eq!(viewer.controller().view_state(), ViewState::Populated);
    let view = viewer.view();
    assert_eq!(view.rows[0].cells[0], "A");
    assert_eq!(view.rows[1].cells[0], "B revised");
    assert_eq!(view.rows[1].cells[1], "Fletcher");
}

#[test]
fn test_malformed_edit_is_rejected() {
    let mut viewer = viewer();
    let ids = viewer.upload(vec![xml_file("a.xml", "A")]).succeeded;

    let mut session = viewer.open_editor(ids[0]).unwrap();
    session.set_text("<TEI>");
    assert!(matches!(
        viewer.save_editor(&session),
        Err(TeiViewerError::Parse(_))
    ));
    assert_eq!(
        viewer.controller().view_state(),
        ViewState::Editing { record_id: ids[0] }
    );

    viewer.cancel_editor().unwrap();
    assert_eq!(viewer.controller().view_state(), ViewState::Populated);
    assert_eq!(viewer.view().rows[0].cells[0], "A");
}

#[test]
fn test_open_editor_without_table() {
    let mut viewer = viewer();
    let id = viewer
        .store()
        .add(NewRecord::new("a.xml", tei("A", "X")))
        .unwrap()
        .id;

    let session = viewer.open_editor(id).unwrap();
    assert_eq!(session.record_id(), id);
    assert_eq!(viewer.controller().view_state(), ViewState::Uninitialized);

    assert!(matches!(
        viewer.open_editor(id + 100),
        Err(TeiViewerError::NotFound(_))
    ));
}

#[test]
fn test_export_formats() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A \"quoted\"")]);
    viewer.dispatch(TableAction::HideColumn(2)).unwrap();

    let csv = viewer.export(ExportFormat::Csv, "cb").unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        r#""Title","Author","Publisher","Date","Language""#
    );
    assert!(lines.next().unwrap().starts_with(r#""A ""quoted""","Shakespeare""#));

    let json = viewer.export(ExportFormat::Json, "cb").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed[0]["filename"], "a.xml");

    let jsonp = viewer.export(ExportFormat::Jsonp, "cb").unwrap();
    assert!(jsonp.starts_with("cb("));
    assert!(jsonp.ends_with(");"));

    let xml = viewer.export(ExportFormat::Xml, "cb").unwrap();
    assert_eq!(xml.matches("<?xml").count(), 1);
    assert!(xml.contains("<TEI"));
}

#[test]
fn test_list_layout() {
    let mut viewer = viewer();
    viewer.upload(vec![xml_file("a.xml", "A")]);

    viewer.load_transform(Layout::List).unwrap();
    viewer.refresh().unwrap();
    assert_eq!(visible_labels(&viewer), vec!["Title", "Source"]);
    assert_eq!(viewer.view().rows[0].cells[1], "Folio");
}

#[test]
fn test_unknown_transform_keeps_previous() {
    let mut settings = Settings::default();
    settings.xsl.selected_list = "missing.yaml".to_string();
    let mut viewer = viewer_with(settings);

    assert!(matches!(
        viewer.load_transform(Layout::List),
        Err(TeiViewerError::Config(_))
    ));
    assert_eq!(viewer.pipeline().active_name(), Some("Default table"));
    assert_eq!(viewer.notifications()[0].level, Level::Danger);
}

#[test]
fn test_doctype_record_is_shown() {
    let mut viewer = viewer();
    let xml = tei("Hamlet", "Shakespeare").replacen(
        "?>\n",
        "?>\n<!DOCTYPE TEI SYSTEM \"tei_all.dtd\">\n",
        1,
    );
    let report = viewer.upload(vec![UploadFile::new("a.xml", "text/xml", xml)]);

    assert!(report.is_success());
    assert_eq!(viewer.store().count().unwrap(), 1);
    assert_eq!(viewer.view().rows[0].cells[0], "Hamlet");
}

#[test]
fn test_internal_dtd_subset_is_rejected() {
    let mut viewer = viewer();
    let report = viewer.upload(vec![UploadFile::new(
        "a.xml",
        "text/xml",
        "<!DOCTYPE TEI [<!ENTITY t \"Hamlet\">]><TEI><teiHeader/></TEI>",
    )]);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(viewer.store().count().unwrap(), 0);
    assert!(viewer
        .take_notifications()
        .iter()
        .any(|n| n.level == Level::Warning && n.message.contains("internal DTD subset")));
}

#[test]
fn test_tei_corpus_gets_a_row() {
    let mut viewer = viewer();
    viewer.upload(vec![
        xml_file("a.xml", "A"),
        UploadFile::new(
            "corpus.xml",
            "text/xml",
            "<teiCorpus><teiHeader><fileDesc><titleStmt><title>Corpus</title></titleStmt></fileDesc></teiHeader><TEI/></teiCorpus>",
        ),
    ]);

    let view = viewer.view();
    assert_eq!(view.pagination.total, 2);
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[1].cells[0], "Corpus");
}

#[test]
fn test_record_without_row_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tei-only.yaml"),
        "name: TEI only\nrow: TEI\ncolumns:\n  - label: Title\n    path: teiHeader/fileDesc/titleStmt/title\n",
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.xsl.selected_table = "tei-only.yaml".to_string();
    let mut viewer = Viewer::new(
        Arc::new(RecordStore::memory()),
        settings,
        Pipeline::new(Some(dir.path().to_path_buf())),
    );
    viewer.load_transform(Layout::Table).unwrap();

    viewer.upload(vec![
        xml_file("a.xml", "A"),
        UploadFile::new("corpus.xml", "text/xml", "<teiCorpus><TEI/></teiCorpus>"),
    ]);

    assert_eq!(viewer.view().rows.len(), 1);
    assert!(viewer
        .take_notifications()
        .iter()
        .any(|n| n.level == Level::Warning && n.message == "corpus.xml has no row in the TEI only layout"));
}

#[test]
fn test_search_filters_page() {
    let mut viewer = viewer();
    viewer.upload(vec![
        xml_file("a.xml", "Hamlet"),
        xml_file("b.xml", "King Lear"),
        xml_file("c.xml", "Macbeth"),
    ]);

    viewer.dispatch(TableAction::Search("lear".to_string())).unwrap();
    let view = viewer.view();
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].cells[0], "King Lear");

    viewer.dispatch(TableAction::Search(String::new())).unwrap();
    assert_eq!(viewer.view().rows.len(), 3);
}
