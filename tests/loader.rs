mod common;

use callcenter_analytics::{
    config::{AnalysisConfig, DataConfig},
    error::AnalyticsError,
    frame::ColumnKind,
    loader::Loader,
};

use common::TestWorkspace;

fn default_loader() -> Loader {
    Loader::new(&AnalysisConfig::default()).expect("loader")
}

#[test]
fn load_infers_column_kinds_from_every_row() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_calls("calls.csv", 40);

    let table = default_loader().load(&path).expect("load calls");

    assert_eq!(table.row_count(), 40);
    assert_eq!(table.column_count(), 13);
    assert_eq!(table.column("Handle Time").unwrap().kind(), ColumnKind::Numeric);
    assert_eq!(table.column("QA Score").unwrap().kind(), ColumnKind::Numeric);
    assert_eq!(table.column("Team").unwrap().kind(), ColumnKind::String);
    // Dates stay text until parse_dates runs.
    assert_eq!(table.column("Date").unwrap().kind(), ColumnKind::String);
}

#[test]
fn missing_tokens_become_missing_cells() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("gaps.csv", "agent,csat_score\na,4\nb,NA\nc,\nd,null\n");

    let table = default_loader().load(&path).expect("load gaps");

    let csat = table.column("csat_score").unwrap();
    assert_eq!(csat.kind(), ColumnKind::Numeric);
    assert_eq!(csat.missing_count(), 3);
}

#[test]
fn directory_input_stacks_every_csv_file() {
    let workspace = TestWorkspace::new();
    workspace.write_calls("daily/a.csv", 10);
    workspace.write_calls("daily/b.csv", 5);
    workspace.write("daily/notes.txt", "not a csv");

    let table = default_loader()
        .load_input(&workspace.path().join("daily"))
        .expect("load directory");

    assert_eq!(table.row_count(), 15);
    assert_eq!(table.column_count(), 13);
}

#[test]
fn directory_pattern_accepts_character_classes() {
    let workspace = TestWorkspace::new();
    workspace.write_calls("exports/calls_1.csv", 4);
    workspace.write_calls("exports/calls_2.csv", 6);
    workspace.write_calls("exports/calls_3.csv", 8);

    let table = default_loader()
        .load_directory(&workspace.path().join("exports"), "calls_[12].csv")
        .expect("load bracket pattern");

    assert_eq!(table.row_count(), 10);
}

#[test]
fn directory_without_matches_is_not_found() {
    let workspace = TestWorkspace::new();
    workspace.write("empty/readme.md", "nothing here");

    let err = default_loader()
        .load_directory(&workspace.path().join("empty"), "*.csv")
        .unwrap_err();

    assert!(matches!(err, AnalyticsError::NotFound { .. }));
}

#[test]
fn load_many_aborts_on_first_missing_file() {
    let workspace = TestWorkspace::new();
    let present = workspace.write_calls("present.csv", 3);
    let absent = workspace.path().join("absent.csv");

    let err = default_loader().load_many(&[present, absent]).unwrap_err();

    assert!(matches!(err, AnalyticsError::NotFound { .. }));
}

#[test]
fn load_many_unions_columns_across_files() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("first.csv", "agent,handle_time\na,300\n");
    let second = workspace.write("second.csv", "agent,qa_score\nb,88\n");

    let table = default_loader().load_many(&[first, second]).expect("load");

    assert_eq!(table.column_names(), vec!["agent", "handle_time", "qa_score"]);
    assert_eq!(table.column("handle_time").unwrap().missing_count(), 1);
    assert_eq!(table.column("qa_score").unwrap().missing_count(), 1);
}

#[test]
fn configured_delimiter_overrides_extension() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("semi.csv", "agent;handle_time\na;300\nb;280\n");
    let config = AnalysisConfig {
        data: DataConfig {
            delimiter: Some(';'),
            ..DataConfig::default()
        },
        ..AnalysisConfig::default()
    };

    let table = Loader::new(&config).unwrap().load(&path).expect("load");

    assert_eq!(table.column_names(), vec!["agent", "handle_time"]);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn tsv_extension_selects_tab_delimiter() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("calls.tsv", "agent\thandle_time\na\t300\n");

    let table = default_loader().load(&path).expect("load tsv");

    assert_eq!(table.column_count(), 2);
}

#[test]
fn unknown_encoding_is_rejected_up_front() {
    let config = AnalysisConfig {
        data: DataConfig {
            encoding: "klingon-8".to_string(),
            ..DataConfig::default()
        },
        ..AnalysisConfig::default()
    };

    let err = Loader::new(&config).unwrap_err();

    assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
}

#[test]
fn empty_file_is_a_load_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "");

    let err = default_loader().load(&path).unwrap_err();

    assert!(matches!(err, AnalyticsError::Load { .. }));
}

#[test]
fn parse_dates_converts_detected_text_columns_only() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "dated.csv",
        "call_date,logged_time,agent\n2024-03-01,480,a\nnot-a-date,470,b\n",
    );
    let loader = default_loader();
    let table = loader.load(&path).unwrap();

    let parsed = loader.parse_dates(&table, None);

    let dates = parsed.column("call_date").unwrap();
    assert_eq!(dates.kind(), ColumnKind::DateTime);
    assert_eq!(dates.missing_count(), 1);
    assert_eq!(parsed.column("logged_time"), table.column("logged_time"));
    assert_eq!(parsed.column("agent"), table.column("agent"));
}
