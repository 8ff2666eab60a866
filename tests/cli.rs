use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SALES_CSV: &str = "\
Date,Revenue,COGS,Sales_Commission,Sales_Program,Customer_Name,Category
2024-01-05,1000,400,50,25,Acme,Hardware
2024-01-20,500,200,25,10,Beta,Software
2024-02-03,2000,800,100,40,Acme,Software
2024-02-28,300,100,15,5,Gamma,Hardware
not-a-date,100,50,5,5,Acme,Hardware
";

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            home: TempDir::new().unwrap(),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.home.path().join("books")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("margo").unwrap();
        cmd.env("HOME", self.home.path()).env_remove("RUST_LOG");
        cmd
    }

    fn init(&self) {
        self.cmd()
            .args(["init", "--data-dir"])
            .arg(self.data_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized margo at"));
    }

    fn write_sales(&self) -> PathBuf {
        let path = self.home.path().join("sales.csv");
        std::fs::write(&path, SALES_CSV).unwrap();
        path
    }

    fn import(&self, file: &Path) {
        self.cmd()
            .arg("import")
            .arg(file)
            .assert()
            .success()
            .stdout(predicate::str::contains("4 imported"));
    }
}

#[test]
fn init_creates_database_and_exports_dir() {
    let env = Env::new();
    env.init();
    assert!(env.data_dir().join("margo.db").exists());
    assert!(env.data_dir().join("exports").is_dir());
}

#[test]
fn import_reports_skipped_rows_and_rejects_duplicates() {
    let env = Env::new();
    env.init();
    let file = env.write_sales();

    env.cmd()
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 imported"))
        .stdout(predicate::str::contains("1 rows skipped"));

    env.cmd()
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));

    env.cmd()
        .args(["import", "--force"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("4 imported"));
}

#[test]
fn import_missing_columns_fails() {
    let env = Env::new();
    env.init();
    let path = env.home.path().join("bad.csv");
    std::fs::write(&path, "Date,Revenue\n2024-01-01,10\n").unwrap();

    env.cmd()
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));

    env.cmd()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("error"));
}

#[test]
fn summary_report_shows_totals() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd()
        .args(["report", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Net Profit"))
        .stdout(predicate::str::contains("Gross Margin"))
        .stdout(predicate::str::contains("3,800"));
}

#[test]
fn summary_json_contains_totals() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    let output = env
        .cmd()
        .args(["report", "summary", "--json", "--month", "2024-01"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["totals"]["revenue"], 1500.0);
    assert_eq!(value["totals"]["gross_profit"], 900.0);
    assert_eq!(value["monthly"].as_array().unwrap().len(), 1);
}

#[test]
fn filters_with_no_match_print_notice() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd()
        .args(["report", "customers", "--customer", "Nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No data matches the selected filters."));

    env.cmd()
        .args(["report", "monthly", "--year", "2019"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No data matches the selected filters."));
}

#[test]
fn half_open_date_range_is_an_error() {
    let env = Env::new();
    env.init();

    env.cmd()
        .args(["report", "summary", "--from", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from requires --to"));
}

#[test]
fn category_and_customer_filters_narrow_reports() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd()
        .args(["report", "categories", "--category", "Hardware"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hardware"))
        .stdout(predicate::str::contains("Software").not());

    env.cmd()
        .args(["report", "customers", "--customer", "Acme", "--customer", "Beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme"))
        .stdout(predicate::str::contains("Beta"))
        .stdout(predicate::str::contains("Gamma").not());
}

#[test]
fn export_summary_writes_csv() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());
    let out = env.home.path().join("summary.csv");

    env.cmd()
        .args(["export", "summary", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let content = std::fs::read_to_string(&out).unwrap();
    assert!(content.starts_with("metric,value,unit"));
    assert!(content.contains("Revenue,3800,"));
}

#[test]
fn export_detail_defaults_to_exports_dir() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd()
        .args(["export", "detail", "--customer", "Acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(2 rows)"));

    let exported: Vec<_> = std::fs::read_dir(env.data_dir().join("exports"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(exported.len(), 1);
}

#[test]
fn history_status_and_list() {
    let env = Env::new();
    env.init();

    env.cmd()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No uploads yet."));

    env.import(&env.write_sales());

    env.cmd()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("sales.csv"))
        .stdout(predicate::str::contains("success"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  4"))
        .stdout(predicate::str::contains("Customers:     3"))
        .stdout(predicate::str::contains("2024-01-05 to 2024-02-28"));

    env.cmd()
        .args(["list", "customers"])
        .assert()
        .success()
        .stdout(predicate::str::diff("Acme\nBeta\nGamma\n"));
}

#[test]
fn clear_requires_confirmation() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd().arg("clear").assert().failure();

    env.cmd()
        .args(["clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 4 transactions."));

    env.cmd()
        .args(["list", "categories"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No data loaded."));
}

#[test]
fn file_mode_analyses_without_storing() {
    let env = Env::new();
    env.init();
    let file = env.write_sales();

    env.cmd()
        .args(["report", "summary", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Net Profit"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  0"));
}

#[test]
fn status_without_database() {
    let env = Env::new();
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn load_switches_and_reports_contents() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    let other = env.home.path().join("other");
    env.cmd()
        .args(["init", "--data-dir"])
        .arg(&other)
        .assert()
        .success();
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  0"));

    env.cmd()
        .arg("load")
        .arg(env.data_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 transactions from 3 customers"))
        .stdout(predicate::str::contains("2024-01-05 to 2024-02-28"));
    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  4"));
}

#[test]
fn load_rejects_directory_without_database() {
    let env = Env::new();
    env.init();
    let empty = env.home.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    env.cmd()
        .arg("load")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("margo init --data-dir"));
}

#[test]
fn list_from_file_labels_the_source() {
    let env = Env::new();
    env.init();
    let file = env.write_sales();

    env.cmd()
        .args(["list", "categories", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::diff("Hardware\nSoftware\n"))
        .stderr(predicate::str::contains("upload-only mode"));
}

#[test]
fn huge_last_window_keeps_all_rows() {
    let env = Env::new();
    env.init();
    env.import(&env.write_sales());

    env.cmd()
        .args(["report", "summary", "--last", "4000000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3,800"));
}
