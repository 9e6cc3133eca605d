use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::{DateTime, Local};
use insight_core::{Job, JobId, JobKind, JobRowView, JobStats, JobStatus};
use insight_engine::{
    cursor_context, is_supported_language, language_for_path, poll_until_complete, ClientSettings,
    FetchError, JobObserver, JobRequest, JobService, ReqwestJobService, SyncEngine,
    TungsteniteConnector,
};
use insight_logging::{insight_info, insight_warn};
use insight_results::{
    diagnostics_for_job, get_diagnostics, get_render_blocks, quick_fixes, render,
    report_filename, to_html, to_terminal, AtomicFileWriter, DiagnosticRecord,
};
use tokio::sync::mpsc;

pub struct Context {
    pub settings: ClientSettings,
    pub user_id: Option<String>,
}

impl Context {
    fn user(&self) -> anyhow::Result<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .context("no user id: pass --user or set user_id in the config file")
    }

    fn service(&self) -> anyhow::Result<ReqwestJobService> {
        ReqwestJobService::new(&self.settings).context("cannot build job service client")
    }
}

enum WatchUpdate {
    Changed(Job),
    Failed(JobId, FetchError),
}

struct ForwardingObserver {
    tx: mpsc::UnboundedSender<WatchUpdate>,
}

impl JobObserver for ForwardingObserver {
    fn on_job_changed(&self, _job_id: &JobId, job: &Job) {
        let _ = self.tx.send(WatchUpdate::Changed(job.clone()));
    }

    fn on_fetch_error(&self, job_id: &JobId, error: &FetchError) {
        let _ = self.tx.send(WatchUpdate::Failed(job_id.clone(), error.clone()));
    }
}

/// Follows jobs until each is terminal or the user interrupts.
pub async fn watch(ctx: &Context, job_ids: Vec<JobId>) -> anyhow::Result<()> {
    let service = Arc::new(ctx.service()?);
    let connector = Arc::new(TungsteniteConnector::new(
        ctx.settings.ws_base_url.clone(),
        ctx.settings.connect_timeout,
    ));
    let engine = SyncEngine::spawn(ctx.settings.clone(), service, connector);
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.add_observer(Arc::new(ForwardingObserver { tx }));
    if ctx.user_id.is_none() {
        insight_warn!("No user id configured; following jobs by polling only");
    }
    engine.set_identity(ctx.user_id.clone());
    for job_id in &job_ids {
        engine.watch(job_id.clone());
    }

    let mut open: HashSet<JobId> = job_ids.iter().cloned().collect();
    let mut finished = Vec::new();
    while !open.is_empty() {
        tokio::select! {
            update = rx.recv() => match update {
                Some(WatchUpdate::Changed(job)) => {
                    println!("{:<24} {}", job.job_id, job.status);
                    if job.is_terminal() && open.remove(&job.job_id) {
                        finished.push(job);
                    }
                }
                Some(WatchUpdate::Failed(job_id, error)) => {
                    eprintln!("{job_id}: {error} (will retry)");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                insight_info!("Interrupted; {} job(s) still open", open.len());
                break;
            }
        }
    }

    for job_id in job_ids {
        engine.unwatch(job_id);
    }
    engine.shutdown().await;

    for job in &finished {
        print_outcome(job, None);
    }
    Ok(())
}

pub async fn poll(ctx: &Context, job_id: &str) -> anyhow::Result<()> {
    let service = ctx.service()?;
    let job = wait_for(&service, &ctx.settings, job_id).await?;
    print_outcome(&job, None);
    Ok(())
}

pub struct ReviewArgs {
    pub file: PathBuf,
    pub language: Option<String>,
    pub cursor_line: Option<usize>,
    pub no_wait: bool,
    pub html: Option<PathBuf>,
}

pub async fn review(ctx: &Context, args: ReviewArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let content = read_text(&args.file)?;
    let language = match args.language.as_deref() {
        Some(language) => language.to_ascii_lowercase(),
        None => language_for_path(&args.file.to_string_lossy())
            .map(str::to_string)
            .context("cannot tell the language from the file name; pass --language")?,
    };
    if !is_supported_language(&language) {
        bail!("language \"{language}\" is not supported yet");
    }

    let mut request = JobRequest::review(user, display_name(&args.file), content.as_str(), language);
    if let Some(line) = args.cursor_line {
        request = request.with_cursor_context(cursor_context(&content, line.saturating_sub(1)));
    }

    let service = ctx.service()?;
    let Some(job) = submit(ctx, &service, &request, args.no_wait).await? else {
        return Ok(());
    };
    print_outcome(&job, Some(content.lines().count()));
    if let Some(dir) = args.html {
        export_html(&job, &dir)?;
    }
    Ok(())
}

pub async fn debug(
    ctx: &Context,
    file: &Path,
    error_log: &Path,
    no_wait: bool,
) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let content = read_text(file)?;
    let log = read_text(error_log)?;
    let mut request = JobRequest::debug(user, display_name(file), content.as_str(), log);
    if let Some(language) = language_for_path(&file.to_string_lossy()) {
        request = request.with_language(language);
    }

    let service = ctx.service()?;
    if let Some(job) = submit(ctx, &service, &request, no_wait).await? {
        print_outcome(&job, Some(content.lines().count()));
    }
    Ok(())
}

pub async fn history(ctx: &Context, limit: usize) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let service = ctx.service()?;
    let jobs = service
        .get_user_jobs(user, limit)
        .await
        .with_context(|| format!("cannot list jobs of {user}"))?;

    for row in jobs.iter().map(JobRowView::from) {
        println!(
            "{:<17} {:<12} {:<10} {:<32} {:>7} ${:.4}{}",
            row.created_at.as_deref().map(format_timestamp).unwrap_or_default(),
            kind_label(row.kind),
            row.status,
            row.label,
            row.tokens,
            row.cost,
            if row.cached { "  cached" } else { "" }
        );
    }

    let stats = JobStats::from_jobs(&jobs);
    println!();
    println!(
        "{} jobs: {} completed, {} failed, {} processing, {} pending",
        stats.total_jobs, stats.completed, stats.failed, stats.processing, stats.pending
    );
    println!(
        "{} tokens, ${:.4}, {} issues found, {:.1}% cache hits",
        stats.total_tokens, stats.total_cost, stats.total_issues, stats.cache_hit_rate
    );
    Ok(())
}

/// Renders a saved result text.
pub fn render_file(result: &Path, html: Option<&Path>) -> anyhow::Result<()> {
    let text = read_text(result)?;
    let presentation = render(&get_render_blocks(&text));
    match html {
        Some(target) => {
            let dir = target.parent().unwrap_or(Path::new("."));
            let name = target
                .file_name()
                .and_then(|name| name.to_str())
                .context("--html needs a file name")?;
            let written = AtomicFileWriter::new(dir.to_path_buf())
                .write(name, &to_html(&presentation))
                .context("cannot write html report")?;
            println!("Wrote {}", written.display());
        }
        None => print!("{}", to_terminal(&presentation)),
    }
    Ok(())
}

pub fn diagnostics(result: &Path, document: &Path) -> anyhow::Result<()> {
    let text = read_text(result)?;
    let line_count = read_text(document)?.lines().count();
    let records = get_diagnostics(&text, line_count);
    print_diagnostics(&document.to_string_lossy(), &records);
    Ok(())
}

async fn submit(
    ctx: &Context,
    service: &ReqwestJobService,
    request: &JobRequest,
    no_wait: bool,
) -> anyhow::Result<Option<Job>> {
    let queued = service
        .enqueue(request)
        .await
        .context("cannot submit job")?;
    println!("Job {} queued ({})", queued.job_id, queued.status);
    if no_wait {
        return Ok(None);
    }
    wait_for(service, &ctx.settings, &queued.job_id).await.map(Some)
}

async fn wait_for(
    service: &dyn JobService,
    settings: &ClientSettings,
    job_id: &str,
) -> anyhow::Result<Job> {
    let budget = settings.poll_budget;
    let mut last = None;
    let job = poll_until_complete(service, job_id, budget, |progress| {
        if last != Some(progress.status) {
            eprintln!(
                "[{}/{}] {job_id}: {}",
                progress.attempt, budget.max_attempts, progress.status
            );
            if progress.status == JobStatus::Throttled {
                eprintln!("Request throttled due to high usage; still waiting");
            }
            last = Some(progress.status);
        }
    })
    .await?;
    Ok(job)
}

fn print_outcome(job: &Job, document_line_count: Option<usize>) {
    match job.status {
        JobStatus::Failed => {
            println!(
                "Job {} failed: {}",
                job.job_id,
                job.error.as_deref().unwrap_or("no error message")
            );
            return;
        }
        status if !status.is_terminal() => {
            println!("Job {} is {status}", job.job_id);
            return;
        }
        _ => {}
    }

    let cached = if job.results.as_ref().is_some_and(|r| r.cached) {
        " (from cache)"
    } else {
        ""
    };
    println!("Job {} completed{cached}", job.job_id);
    match job.result_text() {
        Some(text) => print!("{}", to_terminal(&render(&get_render_blocks(text)))),
        None => println!("No results available."),
    }

    if let Some(line_count) = document_line_count {
        let label = job.file_path.as_deref().unwrap_or(&job.job_id);
        print_diagnostics(label, &diagnostics_for_job(job, line_count));
    }
}

fn print_diagnostics(label: &str, records: &[DiagnosticRecord]) {
    if records.is_empty() {
        println!("No line diagnostics.");
        return;
    }
    for record in records {
        let column = record.column.map(|c| format!(":{c}")).unwrap_or_default();
        let rule = record
            .rule
            .as_deref()
            .map(|rule| format!(" [{rule}]"))
            .unwrap_or_default();
        println!(
            "{label}:{}{column}: {}: {}{rule}",
            record.line, record.severity, record.message
        );
    }
    for fix in quick_fixes(records) {
        println!("  line {}: {} -> {}", fix.line, fix.title, fix.replacement);
    }
}

fn export_html(job: &Job, dir: &Path) -> anyhow::Result<()> {
    let Some(text) = job.result_text() else {
        return Ok(());
    };
    let written = AtomicFileWriter::new(dir.to_path_buf())
        .write(
            &report_filename(job, "html"),
            &to_html(&render(&get_render_blocks(text))),
        )
        .context("cannot write html report")?;
    println!("Wrote {}", written.display());
    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

fn kind_label(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Review => "review",
        JobKind::Debug => "debug",
        JobKind::Architecture => "architecture",
    }
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
