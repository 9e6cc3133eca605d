use insight_core::{Job, JobResults, JobRowView, JobStats, JobStatus, LintIssue, LintResult, TokenUsage};

fn job(id: &str, status: JobStatus, tokens: u64, cost: f64, cached: bool) -> Job {
    let mut job = Job::new(id, status);
    job.tokens_used = Some(TokenUsage {
        prompt_tokens: tokens / 2,
        completion_tokens: tokens - tokens / 2,
        total_tokens: tokens,
    });
    job.estimated_cost = cost;
    job.cache_hit = cached;
    job
}

#[test]
fn stats_aggregate_history() {
    let mut done = job("a", JobStatus::Completed, 100, 0.25, true);
    done.results = Some(JobResults {
        content: "ok".to_string(),
        lint_result: Some(LintResult {
            issues: vec![LintIssue::default(), LintIssue::default()],
        }),
        ..JobResults::default()
    });
    let jobs = vec![
        done,
        job("b", JobStatus::Failed, 50, 0.25, false),
        job("c", JobStatus::Processing, 0, 0.0, false),
        job("d", JobStatus::Throttled, 0, 0.0, true),
    ];

    let stats = JobStats::from_jobs(&jobs);
    assert_eq!(stats.total_jobs, 4);
    assert_eq!(stats.total_tokens, 150);
    assert!((stats.total_cost - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats.total_issues, 2);
    assert_eq!(
        (stats.completed, stats.failed, stats.processing, stats.pending),
        (1, 1, 1, 1)
    );
    assert!((stats.cache_hit_rate - 50.0).abs() < f64::EPSILON);
}

#[test]
fn empty_history_has_zero_hit_rate() {
    let stats = JobStats::from_jobs(&[]);
    assert_eq!(stats, JobStats::default());
}

#[test]
fn row_label_prefers_file_path() {
    let mut with_path = Job::new("j1", JobStatus::Pending);
    with_path.file_path = Some("src/main.rs".to_string());
    assert_eq!(JobRowView::from(&with_path).label, "src/main.rs");
    assert_eq!(JobRowView::from(&Job::new("j2", JobStatus::Pending)).label, "j2");
}
