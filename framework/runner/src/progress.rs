use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar counting finished jobs, or a hidden one when progress is disabled.
///
/// The dispatcher increments it as each job completes.
pub fn start_progress(total_jobs: usize, no_progress: bool) -> ProgressBar {
    if no_progress {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_jobs as u64);
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} jobs [{elapsed_precise}]",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Using default progress style: {e}"),
    }
    pb
}
