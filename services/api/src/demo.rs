use std::path::PathBuf;
use std::sync::Arc;

use anim_survey::config::{AppConfig, ModuleItems};
use anim_survey::error::AppError;
use anim_survey::interaction::{project, LockMode, PillState, RankBoard};
use anim_survey::manifest::ManifestRow;
use anim_survey::pools::{PoolSizes, TaskPools};
use anim_survey::report::SurveyReport;
use anim_survey::responses::{CsvResponseStore, RankingBallot, ResponseStore, SurveyService};
use anim_survey::session::{RaterId, SessionRegistry};
use clap::Args;

use crate::infra::InMemoryResponseStore;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Render the board with hard-locked taken pills instead of advisory styling.
    #[arg(long)]
    pub(crate) strict: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    /// Directory holding the response CSV files (defaults to the configured
    /// storage root).
    #[arg(long)]
    pub(crate) storage: Option<PathBuf>,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let root = match args.storage {
        Some(root) => root,
        None => AppConfig::load()?.survey.storage.resolve_root()?,
    };

    let store = CsvResponseStore::new(&root)?;
    let raters = distinct_raters(&store)?;
    let report = SurveyReport::build(
        &store,
        PoolSizes {
            part_a: 0,
            part_b: 0,
            part_c: 0,
        },
        raters,
    )?;

    println!("Responses under {}", root.display());
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("report serialization failed: {err}"),
    }
    Ok(())
}

fn distinct_raters(store: &CsvResponseStore) -> Result<usize, AppError> {
    let mut ids = std::collections::BTreeSet::new();
    for record in store.singles().map_err(AppError::from)? {
        ids.insert(record.rater_id);
    }
    for record in store.rankings().map_err(AppError::from)? {
        ids.insert(record.rater_id);
    }
    for record in store.diversities().map_err(AppError::from)? {
        ids.insert(record.rater_id);
    }
    Ok(ids.len())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let lock_mode = if args.strict {
        LockMode::Strict
    } else {
        LockMode::Advisory
    };

    println!("Rank assignment walkthrough");
    let mut board = RankBoard::new(["chatgpt", "google", "stability", "bfl"]);
    narrate_pick(&mut board, "chatgpt", 1, lock_mode, "first choice");
    narrate_pick(&mut board, "google", 1, lock_mode, "rank 1 moves to google");
    narrate_pick(&mut board, "google", 1, lock_mode, "clicking again toggles it off");
    narrate_pick(&mut board, "google", 1, lock_mode, "re-assign rank 1");
    narrate_pick(&mut board, "chatgpt", 2, lock_mode, "second choice");
    narrate_pick(
        &mut board,
        "stability",
        3,
        lock_mode,
        "third choice auto-completes bfl at rank 4",
    );

    println!("\nFinal board");
    let view = project(&board, lock_mode);
    for card in &view.cards {
        let pills: Vec<String> = card
            .pills
            .iter()
            .map(|pill| {
                let marker = match pill.state {
                    PillState::Active => "*",
                    PillState::Taken => "x",
                    PillState::Open => " ",
                };
                format!("[{}{marker}]", pill.rank)
            })
            .collect();
        println!("- {:<10} {}", card.provider, pills.join(" "));
    }
    println!("{}", view.progress_line);
    println!(
        "Submit {}",
        if view.submit_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\nBallot submission demo");
    let store = Arc::new(InMemoryResponseStore::default());
    let sessions = Arc::new(SessionRegistry::new());
    let service = SurveyService::new(
        store.clone(),
        sessions,
        demo_pools(),
        ModuleItems { a: 0, b: 2, c: 0 },
    )
    .with_lock_mode(lock_mode);

    let progress = service.plan(Some("demo-rater".to_string()));
    println!(
        "Plan for {}: {} comparison sets",
        progress.rater_id, progress.part_b.total
    );

    let rater = RaterId(progress.rater_id.clone());
    while let Some(item) = service.next_ranking(&rater) {
        let ballot = RankingBallot {
            rater_id: progress.rater_id.clone(),
            category_id: item.key.category_id.clone(),
            prompt_id: item.key.prompt_id.clone(),
            seed_label: item.key.seed_label,
            ranks: board.ranks(),
            images: item
                .tiles
                .iter()
                .map(|tile| (tile.provider.clone(), tile.image_path.clone()))
                .collect(),
            elapsed_ms: 5_400,
            submitted_utc: String::new(),
        };
        match service.submit_ranking(ballot) {
            Ok(()) => println!(
                "- recorded set {}/{} ({})",
                item.index, item.total, item.key.prompt_id
            ),
            Err(err) => println!("- submission rejected: {err}"),
        }
    }

    let report = SurveyReport::build(
        store.as_ref(),
        service.pool_sizes(),
        service.sessions().rater_count(),
    )?;
    println!("\nStandings (lower average rank is better)");
    for row in &report.part_b {
        println!(
            "- {:<10} avg rank {:.2} over {} ballots, {} wins",
            row.provider, row.avg_rank, row.n, row.wins
        );
    }

    Ok(())
}

fn narrate_pick(board: &mut RankBoard, provider: &str, rank: u8, mode: LockMode, note: &str) {
    board.pick(provider, rank);
    let view = project(board, mode);
    println!("pick({provider}, {rank}) [{note}]: {}", view.progress_line);
}

fn demo_pools() -> TaskPools {
    let providers = ["chatgpt", "google", "stability", "bfl"];
    let rows_by_provider = providers
        .iter()
        .map(|provider| {
            let rows = ["p01", "p02"]
                .into_iter()
                .map(|prompt| demo_row(provider, prompt))
                .collect();
            (provider.to_string(), rows)
        })
        .collect();
    TaskPools::build(rows_by_provider, Vec::new(), &[11])
}

fn demo_row(provider: &str, prompt: &str) -> ManifestRow {
    ManifestRow {
        provider: provider.to_string(),
        model: format!("{provider}-demo"),
        run_id: "run-demo".to_string(),
        category_id: "demo".to_string(),
        prompt_id: prompt.to_string(),
        seed_label: 11,
        image_path: PathBuf::from(format!("/demo/{provider}/{prompt}.png")),
        prompt_text: format!("demo prompt {prompt}"),
        has_text: false,
        expected_texts: String::new(),
        no_people: false,
        status: "ok".to_string(),
        width: Some(1024),
        height: Some(1024),
        completed_utc: "2025-07-01T10:00:00Z".to_string(),
    }
}
