use anyhow::{Context, bail};
use chrono::NaiveDate;
use claim_desk::AppState;
use claim_desk::api::{AdminApi, ClaimsApi, ClientError};
use claim_desk::config::ClientConfig;
use claim_desk::models::{
    AngleState, Category, CategoryScheme, ClaimForm, ClaimStatus, ClaimSummary, Credentials,
    Registration, ReportFormat, ReportOptions,
};
use claim_desk::services::admin::high_risk;
use claim_desk::services::upload_queue::LocalFile;
use claim_desk::services::verification::VerificationTracker;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use futures::future::join_all;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "claim-desk", version, about = "Insurance claim client")]
struct Cli {
    /// Base URL of the claims API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token to use instead of CLAIMDESK_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,

    /// Use the relaxed local development limits
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password and print the access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLAIMDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLAIMDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Finish a Google sign-in from the redirect URL
    OauthCallback { url: String },
    /// Print the signed-in user
    Whoami,
    /// List claims visible to the current user
    Claims {
        /// Only claims routed to manual review
        #[arg(long)]
        high_risk: bool,
    },
    /// Show one claim with its analysis
    Show { claim_id: i64 },
    /// File a new claim with its photos
    Submit {
        #[arg(long)]
        policy: String,
        /// Accident date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        location: String,
        #[arg(long)]
        description: String,
        /// CATEGORY=PATH, or just PATH to fill the next missing category
        #[arg(long = "photo", value_parser = parse_photo, required = true)]
        photos: Vec<(Option<Category>, PathBuf)>,
    },
    /// Per-angle verification status of a claim
    Status { claim_id: i64 },
    /// Upload verification photos, one per angle, concurrently
    Upload {
        claim_id: i64,
        /// ANGLE=PATH
        #[arg(long = "photo", value_parser = parse_photo, required = true)]
        photos: Vec<(Option<Category>, PathBuf)>,
    },
    /// Ask the server for its final verification decision
    Finalize { claim_id: i64 },
    /// Set a claim's status (admin)
    SetStatus { claim_id: i64, status: ClaimStatus },
    /// Dashboard counters (admin)
    Stats,
    /// List uploaded images (admin)
    Images {
        #[arg(long)]
        claim: Option<i64>,
    },
    /// Show one uploaded image with its claim (admin)
    Image { image_id: i64 },
    /// Delete an uploaded image (admin)
    DeleteImage { image_id: i64 },
    /// Download a claim report
    Report {
        claim_id: i64,
        #[arg(long, default_value = "pdf")]
        format: ReportFormat,
        #[arg(long)]
        no_images: bool,
        #[arg(long)]
        no_analysis: bool,
        /// Output file (default: claim_report_<id>.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_photo(raw: &str) -> Result<(Option<Category>, PathBuf), String> {
    match raw.split_once('=') {
        Some((category, path)) => {
            let category = category.parse::<Category>().map_err(|e| e.to_string())?;
            Ok((Some(category), PathBuf::from(path)))
        }
        None => Ok((None, PathBuf::from(raw))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claim_desk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = if cli.dev {
        ClientConfig::development()
    } else {
        ClientConfig::from_env()
    };
    if let Some(url) = cli.api_url.clone() {
        config = config.with_base_url(url);
    }
    if let Some(token) = cli.token.clone() {
        config.auth_token = Some(token);
    }

    info!(
        "🚀 claim-desk -> {} (timeout {}s, max {} photos of {}MB)",
        config.api_base_url,
        config.request_timeout_secs,
        config.max_files,
        config.max_file_size / 1024 / 1024
    );

    let state = AppState::new(config)?;

    until_shutdown(run(cli.command, state), shutdown_signal()).await
}

/// Runs `work` unless `shutdown` fires first, in which case the command
/// counts as failed.
async fn until_shutdown(
    work: impl Future<Output = anyhow::Result<()>>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = work => result,
        _ = shutdown => {
            info!("🛑 Interrupted, pending requests abandoned.");
            bail!("interrupted before the command finished")
        }
    }
}

async fn run(command: Command, state: AppState) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let session = state
                .sessions()
                .login(&Credentials { email, password })
                .await?;
            if let Some(user) = &session.user {
                info!("✅ Logged in as {} (admin: {})", user.email, user.is_admin);
            }
            println!("{}", session.access_token);
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let user = state
                .sessions()
                .register(&Registration {
                    name,
                    email,
                    password,
                })
                .await?;
            println!("Registered {} <{}> (id {})", user.name, user.email, user.id);
        }
        Command::OauthCallback { url } => {
            let sessions = state.sessions();
            let user = sessions.complete_oauth(&url).await?;
            info!("✅ Signed in as {}", user.email);
            if let Some(token) = sessions.context().token().await {
                println!("{}", token);
            }
        }
        Command::Whoami => {
            let user = state.sessions().refresh_profile().await?;
            println!(
                "{} <{}>{}",
                user.name,
                user.email,
                if user.is_admin { " [admin]" } else { "" }
            );
        }
        Command::Claims { high_risk: only_risky } => {
            let claims = state.client.list_claims().await?;
            let shown: Vec<&ClaimSummary> = if only_risky {
                high_risk(&claims)
            } else {
                claims.iter().collect()
            };
            for claim in shown {
                print_claim_line(claim);
            }
        }
        Command::Show { claim_id } => {
            let claim = state.client.get_claim(claim_id).await?;
            print_claim(&claim);
        }
        Command::Submit {
            policy,
            date,
            location,
            description,
            photos,
        } => {
            let mut queue = state.upload_queue(CategoryScheme::ClaimPhotos);
            for (category, path) in photos {
                let file = LocalFile::from_path(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let report = match category {
                    Some(c) => queue.add([file.tagged(c)]),
                    None => queue.add([file]),
                };
                for rejection in &report.rejected {
                    eprintln!("⚠️  {}: {}", rejection.name, rejection.reason);
                }
            }

            for (category, count) in queue.coverage() {
                info!("📷 {}: {} photo(s)", category.label(), count);
            }

            let form = ClaimForm {
                policy_number: policy,
                accident_date: date,
                location,
                description,
            };
            let claim = state
                .assembler()
                .submit(&form, &mut queue)
                .await
                .map_err(explain)?;
            println!("Created claim {}", claim.id);
            print_claim(&claim);
        }
        Command::Status { claim_id } => {
            let tracker = state.tracker(claim_id);
            tracker.refresh().await?;
            print_verification(&tracker).await;
        }
        Command::Upload { claim_id, photos } => {
            let tracker = state.tracker(claim_id);
            tracker.refresh().await?;

            let mut jobs = Vec::new();
            for (angle, path) in photos {
                let Some(angle) = angle else {
                    bail!("{}: give the angle as ANGLE=PATH", path.display());
                };
                let file = LocalFile::from_path(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                jobs.push((angle, file));
            }

            let tracker = &tracker;
            let results = join_all(jobs.into_iter().map(|(angle, file)| async move {
                (angle, tracker.upload_one(angle, file).await)
            }))
            .await;

            let mut failed = 0;
            for (angle, result) in results {
                match result {
                    Ok(receipt) => println!("✅ {}: {}", angle.label(), receipt.message),
                    Err(e) => {
                        failed += 1;
                        eprintln!("❌ {}: {}", angle.label(), e);
                    }
                }
            }
            print_verification(tracker).await;
            if failed > 0 {
                bail!("{} upload(s) failed", failed);
            }
        }
        Command::Finalize { claim_id } => {
            let outcome = state.tracker(claim_id).submit().await?;
            let v = &outcome.verification_status;
            println!("{}", outcome.message);
            println!(
                "Verified {}/{} images, average score {:.1}%",
                v.verified_images,
                v.total_images,
                v.average_score * 100.0
            );
            println!("Recommendation: {}", v.recommendation);
            println!("Next steps: {}", outcome.next_steps);
        }
        Command::SetStatus { claim_id, status } => {
            let mut claim = state.client.get_claim(claim_id).await?;
            state.admin().change_status(&mut claim, status).await?;
            println!("Claim {} is now {}", claim.id, claim.status);
        }
        Command::Stats => {
            let stats = state.admin().stats().await?;
            println!("Total claims:    {}", stats.total_claims);
            println!("Pending:         {}", stats.pending_claims);
            println!("Approved:        {}", stats.approved_claims);
            println!("Rejected:        {}", stats.rejected_claims);
            println!("In review:       {}", stats.review_claims);
            println!("High risk:       {}", stats.high_risk_claims);
            println!("Cost estimates:  ${:.2}", stats.total_cost_estimates);
        }
        Command::Images { claim } => match claim {
            Some(claim_id) => {
                for image in state.admin().claim_images(claim_id).await? {
                    println!(
                        "#{} {} {}",
                        image.id,
                        if image.angle.is_empty() { "-" } else { &image.angle },
                        image.image_path
                    );
                }
            }
            None => {
                for image in state.admin().images().await? {
                    println!(
                        "#{} claim {} {} {}",
                        image.id,
                        image.claim_id,
                        if image.angle.is_empty() { "-" } else { &image.angle },
                        image.user_email.as_deref().unwrap_or("")
                    );
                }
            }
        },
        Command::Image { image_id } => {
            let detail = state.admin().image_details(image_id).await?;
            let image = &detail.image;
            println!("Image #{} ({})", image.id, image.image_path);
            println!("  Angle:       {}", if image.angle.is_empty() { "-" } else { &image.angle });
            println!("  Hash:        {}", image.image_hash);
            if let Some(at) = image.uploaded_at {
                println!("  Uploaded:    {}", at.format("%Y-%m-%d %H:%M"));
            }
            let claim = &detail.claim;
            println!("  Claim:       #{} {} ({})", claim.id, claim.policy_number, claim.status);
            if let Some(user) = &claim.user {
                println!("  Claimant:    {} <{}>", user.name, user.email);
            }
        }
        Command::DeleteImage { image_id } => {
            state.admin().delete_image(image_id).await?;
            println!("Deleted image {}", image_id);
        }
        Command::Report {
            claim_id,
            format,
            no_images,
            no_analysis,
            out,
        } => {
            let options = ReportOptions {
                format,
                include_images: !no_images,
                include_analysis: !no_analysis,
            };
            let bytes = state.client.download_report(claim_id, &options).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(options.file_name(claim_id)));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("💾 Saved {} bytes to {}", bytes.len(), path.display());
        }
    }

    Ok(())
}

/// Adds the per-field detail that `Display` leaves out.
fn explain(error: ClientError) -> anyhow::Error {
    let fields = error
        .fields()
        .iter()
        .map(|f| format!("\n  - {}", f))
        .collect::<String>();
    anyhow::anyhow!("{}{}", error, fields)
}

fn print_claim_line(claim: &ClaimSummary) {
    println!(
        "#{:<5} {:<14} {:<10} {}{}",
        claim.id,
        claim.policy_number,
        claim.status,
        claim.accident_date,
        if claim.is_high_risk() { "  ⚠️ high risk" } else { "" }
    );
}

fn print_claim(claim: &ClaimSummary) {
    println!("Claim #{} ({})", claim.id, claim.status);
    println!("  Policy:      {}", claim.policy_number);
    println!("  Date:        {}", claim.accident_date);
    println!("  Location:    {}", claim.location);
    println!("  Description: {}", claim.description);
    if let Some(cost) = claim.cost_estimate {
        println!("  Estimate:    ${:.2}", cost);
    }
    if let Some(damage) = claim.damage() {
        println!(
            "  Damage:      {} ({})",
            damage.severity.as_deref().unwrap_or("unknown"),
            damage.detected_damages.join(", ")
        );
    }
    if let Some(fraud) = claim.fraud() {
        println!(
            "  Fraud risk:  {} (score {:.2})",
            fraud.risk_level.as_deref().unwrap_or("unknown"),
            fraud.fraud_score.or(claim.fraud_score).unwrap_or_default()
        );
    }
    println!("  Photos:      {}", claim.images.len());
}

async fn print_verification(tracker: &VerificationTracker) {
    for angle in CategoryScheme::VehicleAngles.required() {
        let state = tracker.angle_state(*angle).await;
        let marker = match state {
            AngleState::Verified => "✅",
            AngleState::RejectedPendingReupload => "❌",
            AngleState::Uploaded | AngleState::Uploading => "⏳",
            AngleState::NotStarted => "·",
        };
        println!("{} {:<11} {:?}", marker, angle.label(), state);
    }
    println!("{}", tracker.progress_label().await);
    if let Some(badge) = tracker.completion_badge().await {
        println!("🏆 {}", badge);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received");
        },
        _ = terminate => {
            info!("💤 SIGTERM received");
        },
    }
}
