use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::tempdir;

use tenant_sizer_core::archive::StatisticsExportConnector;
use tenant_sizer_core::config::SessionConfig;
use tenant_sizer_core::directory::CsvGroupDirectory;
use tenant_sizer_core::render::{HtmlRenderer, Renderer};
use tenant_sizer_core::reports::{CsvDirectorySource, ReportKind, ReportSource};
use tenant_sizer_core::session::SessionManager;
use tenant_sizer_core::{
    AppConfig, Error, RunOptions, SilentReporter, SizingEngine, UsageSample, Workload,
};

const MAIL_DETAIL_HEADER: &str =
    "Report Refresh Date,User Principal Name,Display Name,Is Deleted,Storage Used (Byte),Has Archive,Recipient Type";

/// Write a full set of report exports:
///   mail:     60 user + 40 shared mailboxes at 1000 bytes, plus 3 deleted;
///             every tenth user mailbox has an archive
///   personal: 80 users at 2000 bytes
///   sites:    5 sites at 10000 bytes
///   history:  mail 1000 -> 1005 -> 1010, sites 100 -> 150, no personal history
fn write_reports(dir: &Path) {
    let mut mail = format!("{}\n", MAIL_DETAIL_HEADER);
    for i in 0..100 {
        let kind = if i < 60 { "User" } else { "Shared" };
        let archive = if i < 60 && i % 10 == 0 { "True" } else { "False" };
        writeln!(
            mail,
            "2024-06-30,user{i}@contoso.com,User {i},False,1000,{archive},{kind}"
        )
        .unwrap();
    }
    for i in 0..3 {
        writeln!(mail, "2024-06-30,gone{i}@contoso.com,Gone,True,999999,False,User").unwrap();
    }
    fs::write(dir.join("MailboxUsageDetail.csv"), mail).unwrap();

    let mut personal =
        String::from("Report Refresh Date,Owner Principal Name,Is Deleted,Storage Used (Byte)\n");
    for i in 0..80 {
        writeln!(personal, "2024-06-30,user{i}@contoso.com,False,2000").unwrap();
    }
    fs::write(dir.join("OneDriveUsageAccountDetail.csv"), personal).unwrap();

    let mut sites =
        String::from("Report Refresh Date,Site Id,Site URL,Is Deleted,Storage Used (Byte),Root Web Template\n");
    for i in 0..5 {
        writeln!(sites, "2024-06-30,site-{i},https://contoso/sites/{i},False,10000,Team Site").unwrap();
    }
    fs::write(dir.join("SharePointSiteUsageDetail.csv"), sites).unwrap();

    fs::write(
        dir.join("MailboxUsageStorage.csv"),
        "Report Refresh Date,Storage Used (Byte),Report Date,Report Period\n\
         2024-06-30,1010,2024-06-30,180\n\
         2024-06-30,1000,2024-06-28,180\n\
         2024-06-30,1005,2024-06-29,180\n",
    )
    .unwrap();
    fs::write(
        dir.join("SharePointSiteUsageStorage.csv"),
        "Report Refresh Date,Site Type,Storage Used (Byte),Report Date,Report Period\n\
         2024-06-30,All,100,2024-06-29,180\n\
         2024-06-30,All,150,2024-06-30,180\n",
    )
    .unwrap();
}

#[test]
fn test_full_run_from_csv_exports() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());

    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);
    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();

    assert_eq!(report.mail.entity_count, 60);
    assert_eq!(report.mail.entity_label, "User mailboxes");
    assert_eq!(report.mail.total_bytes, 100_000);
    assert_eq!(report.mail.average_bytes, 1000);
    assert_eq!(report.mail.growth_percent, 1);
    let mailboxes = report.mail.mailboxes.as_ref().unwrap();
    assert_eq!(mailboxes.user_mailboxes, 60);
    assert_eq!(mailboxes.shared_mailboxes, 40);
    assert!(report.mail.archive.is_none());

    assert_eq!(report.personal_files.entity_count, 80);
    assert_eq!(report.personal_files.total_bytes, 160_000);
    assert_eq!(report.personal_files.growth_percent, 10);

    assert_eq!(report.team_sites.entity_count, 5);
    assert_eq!(report.team_sites.total_bytes, 50_000);
    assert_eq!(report.team_sites.growth_percent, 100);
    assert_eq!(report.team_sites.one_year_projected_bytes, 100_000);

    assert_eq!(
        report.total_bytes,
        report.mail.total_bytes + report.personal_files.total_bytes + report.team_sites.total_bytes
    );
    assert_eq!(report.total_bytes, 310_000);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Personal files"));
}

#[test]
fn test_missing_workload_report_leaves_defaults() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());
    fs::remove_file(tmp.path().join("SharePointSiteUsageDetail.csv")).unwrap();

    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);
    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();

    assert_eq!(report.team_sites, Default::default());
    assert_eq!(report.total_bytes, 260_000);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.starts_with("Team sites") && w.contains("SharePointSiteUsageDetail")));
}

#[test]
fn test_empty_directory_still_produces_a_report() {
    let tmp = tempdir().unwrap();
    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);

    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();
    assert_eq!(report.total_bytes, 0);
    assert_eq!(report.warnings.len(), 3);
}

#[test]
fn test_group_scope_filters_user_workloads() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());
    let members = tmp.path().join("GroupMembers.csv");
    fs::write(
        &members,
        "Group,Member\nPilot,USER0@contoso.com\nPilot,user1@contoso.com\nPilot,user65@contoso.com\nPilot,gone0@contoso.com\n",
    )
    .unwrap();

    let source = CsvDirectorySource::new(tmp.path());
    let directory = CsvGroupDirectory::new(&members);
    let engine = SizingEngine::new(AppConfig::default(), &source).with_group_directory(&directory);
    let options = RunOptions {
        group: Some("Pilot".to_string()),
    };
    let report = engine.run(&options, &SilentReporter).unwrap();

    assert_eq!(report.group.as_deref(), Some("Pilot"));
    // user0, user1 (user) and user65 (shared); gone0 is deleted.
    assert_eq!(report.mail.total_bytes, 3000);
    assert_eq!(report.mail.entity_count, 2);
    assert_eq!(report.personal_files.entity_count, 3);
    assert_eq!(report.personal_files.total_bytes, 6000);
    // Sites are not user-scoped.
    assert_eq!(report.team_sites.entity_count, 5);
}

#[test]
fn test_unknown_or_empty_group_is_fatal() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());
    let members = tmp.path().join("GroupMembers.csv");
    fs::write(&members, "Group,Member\nHollow,\n").unwrap();

    let source = CsvDirectorySource::new(tmp.path());
    let directory = CsvGroupDirectory::new(&members);
    let engine = SizingEngine::new(AppConfig::default(), &source).with_group_directory(&directory);

    let missing = RunOptions {
        group: Some("Nobody".to_string()),
    };
    assert!(matches!(
        engine.run(&missing, &SilentReporter),
        Err(Error::GroupNotFound(_))
    ));

    let empty = RunOptions {
        group: Some("Hollow".to_string()),
    };
    assert!(matches!(
        engine.run(&empty, &SilentReporter),
        Err(Error::EmptyGroup(_))
    ));
}

/// In-memory report source; kinds listed in `denied` answer with a
/// permission error and kinds without rows are missing.
#[derive(Default)]
struct MemorySource {
    reports: HashMap<ReportKind, Vec<UsageSample>>,
    denied: Vec<ReportKind>,
}

impl ReportSource for MemorySource {
    fn fetch(&self, kind: ReportKind, _period_days: u32) -> Result<Vec<UsageSample>, Error> {
        if self.denied.contains(&kind) {
            return Err(Error::Permission {
                role: "Reports Reader".to_string(),
            });
        }
        self.reports
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::ReportMissing(kind.file_stem().to_string()))
    }
}

fn rows(count: usize, bytes: u64) -> Vec<UsageSample> {
    let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    (0..count)
        .map(|i| UsageSample::new(date, format!("entity{}", i), bytes))
        .collect()
}

#[test]
fn test_workload_totals_sum_with_memory_source() {
    let mut source = MemorySource::default();
    source.reports.insert(ReportKind::MailboxDetail, rows(100, 10));
    source.reports.insert(ReportKind::PersonalFilesDetail, rows(80, 20));
    source.reports.insert(ReportKind::SiteDetail, rows(5, 30));

    let engine = SizingEngine::new(AppConfig::default(), &source);
    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();

    assert_eq!(report.mail.entity_count, 100);
    assert_eq!(report.personal_files.entity_count, 80);
    assert_eq!(report.team_sites.entity_count, 5);
    assert_eq!(report.total_bytes, 1000 + 1600 + 150);
    for workload in Workload::ALL {
        assert_eq!(report.workload(workload).growth_percent, 10);
    }
}

#[test]
fn test_shared_majority_sets_mail_label() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let mut mail: Vec<UsageSample> = (0..3)
        .map(|i| UsageSample::new(date, format!("u{}", i), 100).with_kind("User"))
        .collect();
    mail.extend((0..5).map(|i| UsageSample::new(date, format!("s{}", i), 100).with_kind("Shared")));
    mail.push(UsageSample::new(date, "room", 100).with_kind("Room"));

    let mut source = MemorySource::default();
    source.reports.insert(ReportKind::MailboxDetail, mail);

    let engine = SizingEngine::new(AppConfig::default(), &source);
    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();

    assert_eq!(report.mail.entity_count, 5);
    assert_eq!(report.mail.entity_label, "Shared mailboxes");
    assert_eq!(report.mail.total_bytes, 900);
    assert_eq!(report.mail.average_bytes, 100);
}

#[test]
fn test_mail_totals_saturate() {
    let mut source = MemorySource::default();
    source.reports.insert(ReportKind::MailboxDetail, rows(2, u64::MAX));
    source.reports.insert(ReportKind::SiteDetail, rows(1, 10));

    let engine = SizingEngine::new(AppConfig::default(), &source);
    let report = engine.run(&RunOptions::default(), &SilentReporter).unwrap();

    assert_eq!(report.mail.total_bytes, u64::MAX);
    assert_eq!(report.mail.average_bytes, u64::MAX / 2);
    assert_eq!(report.mail.one_year_projected_bytes, u64::MAX);
    assert_eq!(report.total_bytes, u64::MAX);
    assert_eq!(report.projected_total_bytes, u64::MAX);
}

#[test]
fn test_archive_candidates_are_flagged_in_scope_mailboxes() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let mail = vec![
        UsageSample::new(date, "a@contoso.com", 100).with_archive(true),
        UsageSample::new(date, "b@contoso.com", 100),
        UsageSample::new(date, "c@contoso.com", 100)
            .with_archive(true)
            .deleted(true),
        UsageSample::new(date, "d@contoso.com", 100).with_archive(true),
    ];
    let mut source = MemorySource::default();
    source.reports.insert(ReportKind::MailboxDetail, mail);

    let tmp = tempdir().unwrap();
    let stats = tmp.path().join("ArchiveMailboxStatistics.csv");
    fs::write(
        &stats,
        "Identity,TotalItemSize
         a@contoso.com,512 bytes
         b@contoso.com,4096 bytes
         c@contoso.com,8192 bytes
",
    )
    .unwrap();

    let engine = SizingEngine::new(AppConfig::default(), &source);
    let mut manager =
        SessionManager::new(StatisticsExportConnector::new(&stats), SessionConfig::default());
    let report = engine
        .run_with_archives(&RunOptions::default(), &mut manager, &SilentReporter)
        .unwrap();

    // Only a and d are walked: b has no archive, c is deleted, d is absent.
    let archive = report.mail.archive.as_ref().unwrap();
    assert_eq!(archive.mailbox_count, 1);
    assert_eq!(archive.total_bytes, 512);
    assert_eq!(archive.skipped, 1);
}

#[test]
fn test_malformed_archive_export_keeps_the_report() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());
    let stats = tmp.path().join("ArchiveMailboxStatistics.csv");
    fs::write(&stats, "Identity,TotalItemSize
user0@contoso.com
").unwrap();

    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);
    let mut manager =
        SessionManager::new(StatisticsExportConnector::new(&stats), SessionConfig::default());
    let report = engine
        .run_with_archives(&RunOptions::default(), &mut manager, &SilentReporter)
        .unwrap();

    assert!(report.mail.archive.is_none());
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("archives") && w.contains("after 1 consecutive")));
}

#[test]
fn test_permission_error_aborts_run() {
    let mut source = MemorySource::default();
    source.reports.insert(ReportKind::MailboxDetail, rows(3, 10));
    source.denied.push(ReportKind::PersonalFilesDetail);

    let engine = SizingEngine::new(AppConfig::default(), &source);
    let err = engine.run(&RunOptions::default(), &SilentReporter).unwrap_err();

    assert!(matches!(err, Error::Permission { ref role } if role == "Reports Reader"));
    assert!(err.to_string().contains("Reports Reader"));
}

#[test]
fn test_archives_from_statistics_export() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());
    let stats = tmp.path().join("ArchiveMailboxStatistics.csv");
    fs::write(
        &stats,
        "Identity,TotalItemSize\n\
         user0@contoso.com,\"2 KB (2,048 bytes)\"\n\
         user10@contoso.com,\"1 KB (1,024 bytes)\"\n\
         user20@contoso.com,Unlimited\n",
    )
    .unwrap();

    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);
    let mut manager =
        SessionManager::new(StatisticsExportConnector::new(&stats), SessionConfig::default());
    let report = engine
        .run_with_archives(&RunOptions::default(), &mut manager, &SilentReporter)
        .unwrap();

    let archive = report.mail.archive.as_ref().unwrap();
    assert_eq!(archive.mailbox_count, 2);
    assert_eq!(archive.total_bytes, 3072);
    assert_eq!(archive.average_bytes, 1536);
    // user20 unparsable, user30/40/50 missing from the export.
    assert_eq!(archive.skipped, 4);
    assert_eq!(report.total_bytes, 310_000);
}

#[test]
fn test_unreachable_archive_service_keeps_the_report() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());

    let source = CsvDirectorySource::new(tmp.path());
    let engine = SizingEngine::new(AppConfig::default(), &source);
    let policy = SessionConfig {
        retry_delay_secs: 0,
        ..SessionConfig::default()
    };
    let mut manager =
        SessionManager::new(StatisticsExportConnector::new(tmp.path().join("absent.csv")), policy);
    let report = engine
        .run_with_archives(&RunOptions::default(), &mut manager, &SilentReporter)
        .unwrap();

    assert!(report.mail.archive.is_none());
    assert_eq!(report.mail.total_bytes, 100_000);
    assert!(report.warnings.iter().any(|w| w.contains("archives")));
}

#[test]
fn test_render_full_report() {
    let tmp = tempdir().unwrap();
    write_reports(tmp.path());

    let source = CsvDirectorySource::new(tmp.path());
    let report = SizingEngine::new(AppConfig::default(), &source)
        .run(&RunOptions::default(), &SilentReporter)
        .unwrap();

    let out = tmp.path().join("out");
    let path = HtmlRenderer::new(&out).render(&report).unwrap();
    let html = fs::read_to_string(path).unwrap();

    assert!(html.contains("60 user mailboxes"));
    assert!(html.contains("5 sites"));
    assert!(html.contains("Warnings"));
}
