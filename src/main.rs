//! gwork CLI: search job boards, manage profiles and monitoring from a shell.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gwork::app::App;
use gwork::config::load_settings;
use gwork::models::{CommunicationStyle, CompanyProfile, MonitoringSettings, Source, VacancyBrief};

#[derive(Parser)]
#[command(name = "gwork", about = "Candidate sourcing from HH.ru, SuperJob, Habr Career and Avito", version)]
struct Cli {
    /// Path to a config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and data directory.
    Init,
    /// Create or update the company profile for an owner.
    Profile {
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        industry: String,
        #[arg(long, default_value = "Москва")]
        city: String,
        #[arg(long, default_value = "5/2")]
        schedule: String,
        #[arg(long, default_value = "")]
        salary: String,
        /// strict, friendly, or neutral.
        #[arg(long, default_value = "neutral")]
        style: String,
    },
    /// Search all boards and print the ranked results.
    Search {
        #[arg(long)]
        owner: i64,
        query: String,
        /// Override the profile city.
        #[arg(long)]
        city: Option<String>,
        /// Restrict sources (hh, superjob, habr, avito). Repeatable.
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Create a vacancy brief and collect candidates for it.
    Vacancy {
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        query: String,
        #[arg(long)]
        salary_min: Option<i64>,
        #[arg(long)]
        salary_max: Option<i64>,
    },
    /// Run one background collection pass for an owner.
    Collect {
        #[arg(long)]
        owner: i64,
        /// Configure monitoring before collecting: comma-separated keywords.
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gwork=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref());
    let app = App::build(&settings).await?;

    match cli.command {
        Command::Init => {
            println!("База данных готова: {}", settings.database_path().display());
        }
        Command::Profile {
            owner,
            name,
            industry,
            city,
            schedule,
            salary,
            style,
        } => {
            let profile = CompanyProfile {
                owner_id: owner,
                company_name: name,
                industry,
                city,
                schedule,
                salary,
                communication_style: CommunicationStyle::from_str(&style),
            };
            if app.companies.upsert(&profile).await? {
                println!("Профиль компании сохранен (owner {})", owner);
            } else {
                eprintln!("Профиль не сохранен: проверьте название компании");
                std::process::exit(1);
            }
        }
        Command::Search {
            owner,
            query,
            city,
            sources,
        } => {
            let source_set: Vec<Source> = sources
                .iter()
                .filter_map(|s| Source::from_str(s))
                .collect();
            let sources = if source_set.is_empty() {
                None
            } else {
                Some(source_set.as_slice())
            };

            let result = app
                .search
                .search_vacancies(owner, &query, city.as_deref(), sources)
                .await?;
            print_result(&query, &result);
        }
        Command::Vacancy {
            owner,
            title,
            query,
            salary_min,
            salary_max,
        } => {
            let brief = VacancyBrief {
                title,
                query: query.clone(),
                experience_required: true,
                schedule: String::new(),
                salary_min,
                salary_max,
                critical_requirements: vec![],
            };
            let (vacancy_id, result) = app
                .search
                .create_vacancy_and_find_candidates(owner, &brief)
                .await?;
            println!("Вакансия #{} создана", vacancy_id);
            print_result(&query, &result);
        }
        Command::Collect {
            owner,
            keywords,
            city,
        } => {
            if let Some(keywords) = keywords {
                let existing = app.monitoring.get(owner).await?;
                let settings = MonitoringSettings {
                    owner_id: owner,
                    city: city
                        .or_else(|| existing.as_ref().map(|s| s.city.clone()))
                        .unwrap_or_default(),
                    keywords: keywords.split(',').map(|k| k.trim().to_string()).collect(),
                    interval_minutes: existing.as_ref().map(|s| s.interval_minutes).unwrap_or(60),
                    is_active: true,
                    sources: existing.map(|s| s.sources).unwrap_or_default(),
                    last_check: None,
                };
                app.monitoring.upsert(&settings).await?;
            }
            let monitor = Arc::clone(&app.monitor);
            let saved = monitor.collect_once(owner).await?;
            println!("Собрано новых вакансий: {}", saved);
        }
    }

    Ok(())
}

fn print_result(query: &str, result: &gwork::aggregator::RankedResult) {
    if result.postings.is_empty() && result.info_notices.is_empty() {
        if result.all_sources_failed() {
            println!("Источники недоступны:");
            for report in &result.per_source {
                println!("  {} — {}", report.source.display_name(), report.outcome.describe());
            }
        } else {
            println!("По запросу «{}» ничего не найдено", query);
        }
        return;
    }

    println!(
        "Найдено {} вакансий (сохранено {}, дубликатов {})",
        result.postings.len(),
        result.saved,
        result.duplicates
    );
    for report in &result.per_source {
        println!(
            "  {}: {} — {}",
            report.source.display_name(),
            report.count,
            report.outcome.describe()
        );
    }
    for (i, scored) in result.postings.iter().enumerate() {
        println!(
            "\n{}. {} {} [{}/100]",
            i + 1,
            scored.score.tier.color(),
            scored.posting.title,
            scored.score.value
        );
        println!("   💰 {}", scored.posting.salary);
        println!("   📍 {}", scored.posting.city);
        println!("   📅 {}", scored.posting.published);
        println!("   🔗 {}", scored.posting.url);
        println!("   {} — {}", scored.score.verdict, scored.score.recommendation);
    }
    for notice in &result.info_notices {
        println!("\nℹ️  {}", notice.title);
        println!("   {}", notice.description);
        println!("   🔗 {}", notice.url);
    }
}
