use crate::test::SimReport;
use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

pub(crate) fn write_junit_xml(
    report: &SimReport,
    suite_name: &str,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut test_cases = Vec::new();

    for t in report.tests.iter() {
        let tc = match &t.result {
            Ok(_) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Err(e) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &e.to_string(),
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite_name)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)?;
    report.write_xml(file)?;
    Ok(())
}
