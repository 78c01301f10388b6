use colored::{ColoredString, Colorize};
use reconcile::{Action, ApplyProgress, ApplySummary, Change, ChangeOutcome, Plan};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Plan presentation
// ============================================================================

/// Marker shown in front of a change, keyed by its action label
fn marker(action: &str) -> ColoredString {
    match action {
        a if a == Action::Create.as_str() => "+".green().bold(),
        a if a == Action::Delete.as_str() || a == Action::Remove.as_str() => "-".red().bold(),
        a if a == Action::Grant.as_str() => "→".cyan().bold(),
        a if a == Action::Ensure.as_str() => "~".yellow().bold(),
        _ => "?".dimmed(),
    }
}

/// Print the plan for `org`: changes in apply order, counts, then warnings
pub fn print_plan(org: &str, plan: &Plan) {
    header(&format!("Plan for {org}"));

    if plan.is_empty() {
        success("Organization already matches configuration");
    } else {
        for change in plan.ordered() {
            println!("  {} {}", marker(change.action()), describe(change));
        }

        section("Summary");
        for (label, count) in plan.counts() {
            kv(&label, &count.to_string());
        }
    }

    if !plan.warnings.is_empty() {
        section("Warnings");
        for warning in &plan.warnings {
            warn(warning);
        }
    }
}

fn describe(change: &Change) -> String {
    format!(
        "{}:{} {}",
        change.scope(),
        change.action(),
        change.target().bold()
    )
}

/// Print the result of an apply run
pub fn print_summary(summary: &ApplySummary) {
    section("Result");
    kv("applied", &summary.applied.to_string());
    if summary.tolerated > 0 {
        kv("already present", &summary.tolerated.to_string());
    }
    if summary.skipped > 0 {
        kv("skipped", &summary.skipped.to_string());
    }
    if summary.ignored > 0 {
        kv("ignored", &summary.ignored.to_string());
    }
}

/// Console progress for apply runs
#[derive(Default)]
pub struct ConsoleProgress {
    total: usize,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { total: 0, quiet }
    }
}

impl ApplyProgress for ConsoleProgress {
    fn on_start(&mut self, total: usize) {
        self.total = total;
        if !self.quiet && total > 0 {
            section(&format!("Applying {total} change(s)"));
        }
    }

    fn on_change_start(&mut self, index: usize, change: &Change) {
        log::debug!("Applying [{}/{}] {change}", index + 1, self.total);
    }

    fn on_change_complete(&mut self, index: usize, change: &Change, outcome: &ChangeOutcome) {
        if self.quiet {
            return;
        }
        let note = match outcome {
            ChangeOutcome::Applied => String::new(),
            ChangeOutcome::Tolerated { reason } | ChangeOutcome::Skipped { reason } => {
                format!(" {}", format!("({reason})").dimmed())
            }
            ChangeOutcome::Ignored => format!(" {}", "(ignored)".dimmed()),
        };
        step(index + 1, self.total, &format!("{}{note}", describe(change)));
    }
}
