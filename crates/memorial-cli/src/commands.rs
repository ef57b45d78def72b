//! Subcommand definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::debug;

use memorial_core::api::ApiClient;
use memorial_core::auth::TokenStore;
use memorial_core::models::deceased::DEFAULT_PAGE_SIZE;
use memorial_core::models::{
    DeceasedProfileCreate, DeceasedProfileUpdate, FileUpload, Gender, LoginRequest,
    PasswordChange, PrivacyLevel, ProfileQuery, ProfileUpdate, RegisterRequest,
};
use memorial_core::notify::{SharedNotifier, TracingNotifier};
use memorial_core::utils::{format_date, format_optional, format_remaining, truncate_string};
use memorial_core::{
    guard, Config, GuardDecision, Notification, NotificationLevel, Notifier, Route,
    SessionManager, SessionState,
};

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Account email (defaults to the last one used)
        #[arg(short, long)]
        email: Option<String>,

        /// Keep the session for longer
        #[arg(long)]
        remember_me: bool,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change the account password
    Passwd,
    /// Manage the account profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Manage deceased profiles
    Deceased {
        #[command(subcommand)]
        command: DeceasedCommand,
    },
    /// Upload a photo or document
    Upload {
        /// File to upload
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Attach the file to this deceased profile
        #[arg(long, value_name = "ID")]
        profile: Option<String>,
    },
    /// Show server health and local session status
    Status,
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// Update profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Interface language (vi, en)
        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        timezone: Option<String>,
    },
    /// Permanently delete the account
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DeceasedCommand {
    /// List profiles
    List {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        family: Option<String>,

        #[arg(long, default_value_t = 0)]
        skip: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
    /// Show one profile
    Show {
        #[arg(value_name = "ID")]
        id: String,

        /// Print the raw profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a profile
    Create {
        /// Full Vietnamese name
        #[arg(long)]
        name: String,

        /// male, female or other (nam, nữ, khác also accepted)
        #[arg(long)]
        gender: String,

        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        death_date: Option<String>,

        /// Death anniversary on the lunar calendar
        #[arg(long)]
        death_date_lunar: Option<String>,

        /// public, family or private
        #[arg(long)]
        privacy: Option<String>,

        #[arg(long)]
        family: Option<String>,
    },
    /// Edit a profile; only the given fields change
    Edit {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        death_date: Option<String>,

        #[arg(long)]
        death_date_lunar: Option<String>,

        #[arg(long)]
        resting_place: Option<String>,

        /// public, family or private
        #[arg(long)]
        privacy: Option<String>,
    },
    /// Delete a profile
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Prints notifications to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notification: Notification) {
        let marker = match notification.level {
            NotificationLevel::Success => "✓",
            NotificationLevel::Info => "i",
            NotificationLevel::Warning => "!",
            NotificationLevel::Error => "✗",
        };
        eprintln!("{} {}", marker, notification.message);
    }
}

fn build_manager(config: &Config, quiet: bool) -> Result<SessionManager> {
    let storage = config.open_storage()?;
    let tokens = TokenStore::new(storage).with_clock_skew(config.clock_skew_secs);
    let notifier: SharedNotifier = if quiet {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(StderrNotifier)
    };
    let api = ApiClient::new(config.client_config(), tokens, notifier)
        .context("create API client")?;
    Ok(SessionManager::new(api))
}

/// Resolve `route` against the session, failing with a readable message on redirect.
fn enter(state: &SessionState, route: Route) -> Result<()> {
    match guard(state, &route) {
        GuardDecision::Render => Ok(()),
        GuardDecision::Redirect(Route::Login) => {
            bail!("Please sign in first: memorial login")
        }
        GuardDecision::Redirect(target) => bail!("{} is not available here (try {})", route, target),
        GuardDecision::Wait => bail!("Session is still loading, try again"),
    }
}

fn prompt_line(label: &str) -> Result<String> {
    use std::io::Write;

    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }
    Ok(password)
}

pub async fn run(command: Command, mut config: Config, quiet: bool) -> Result<()> {
    let manager = build_manager(&config, quiet)?;
    let state = manager.initialize().await;
    debug!(authenticated = state.is_authenticated, "Session initialized");

    match command {
        Command::Login { email, remember_me } => {
            if let GuardDecision::Redirect(_) = guard(&state, &Route::Login) {
                let name = state.user.map(|u| u.full_name()).unwrap_or_default();
                println!("Already signed in as {}", name);
                return Ok(());
            }

            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt_line("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let mut request = LoginRequest::new(&email, &password);
            request.remember_me = remember_me;

            manager.login(&request).await?;

            config.last_email = Some(email);
            config.save().context("save config")?;
            Ok(())
        }

        Command::Register {
            email,
            first_name,
            last_name,
            phone,
        } => {
            enter(&state, Route::Register)?;
            let password = prompt_new_password()?;
            let mut data = RegisterRequest::new(&email, &password, &first_name, &last_name);
            data.phone_number = phone;
            data.language = config.locale.to_string();

            manager.register(&data).await?;

            config.last_email = Some(email);
            config.save().context("save config")?;
            Ok(())
        }

        Command::Logout => {
            if !state.is_authenticated {
                println!("Not signed in");
                return Ok(());
            }
            manager.logout().await;
            Ok(())
        }

        Command::Whoami => {
            enter(&state, Route::Profile)?;
            let Some(user) = manager.user() else {
                bail!("No user information available");
            };
            println!("{} <{}>", user.full_name(), user.email);
            println!("  id:        {}", user.id);
            println!("  phone:     {}", format_optional(&user.phone_number, "-"));
            println!("  language:  {}", user.language);
            println!("  timezone:  {}", user.timezone);
            println!("  verified:  {}", if user.email_verified { "yes" } else { "no" });
            if let Some(ref created) = user.created_at {
                println!("  joined:    {}", format_date(created));
            }
            if let Some(expiry) = manager.api().tokens().expires_at() {
                let remaining = (expiry - chrono::Utc::now()).num_seconds();
                println!("  token:     {}", format_remaining(remaining));
            }
            if let Some(error) = manager.error() {
                println!("  note:      {}", error);
            }
            Ok(())
        }

        Command::Passwd => {
            enter(&state, Route::Profile)?;
            let current = rpassword::prompt_password("Current password: ")?;
            let new_password = prompt_new_password()?;
            manager
                .change_password(&PasswordChange {
                    current_password: current,
                    new_password,
                })
                .await?;
            Ok(())
        }

        Command::Profile { command } => {
            enter(&state, Route::Profile)?;
            match command {
                ProfileCommand::Update {
                    first_name,
                    last_name,
                    phone,
                    language,
                    timezone,
                } => {
                    let patch = ProfileUpdate {
                        first_name,
                        last_name,
                        phone_number: phone,
                        language,
                        timezone,
                        ..ProfileUpdate::default()
                    };
                    if patch.is_empty() {
                        bail!("Nothing to update");
                    }
                    manager.update_profile(&patch).await?;
                    Ok(())
                }
                ProfileCommand::Delete { yes } => {
                    if !yes {
                        bail!("Deleting the account is permanent; pass --yes to confirm");
                    }
                    manager.delete_account().await?;
                    Ok(())
                }
            }
        }

        Command::Deceased { command } => run_deceased(&manager, &state, command).await,

        Command::Upload { file, profile } => {
            let route = match profile {
                Some(ref id) => Route::DeceasedEdit(id.clone()),
                None => Route::Dashboard,
            };
            enter(&state, route)?;

            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());
            let mut upload = FileUpload::new(&file_name, bytes);
            if let Some(ref id) = profile {
                upload = upload.for_profile(id);
            }

            let uploaded = manager.api().upload_file(upload).await?;
            println!("{} ({})", uploaded.url, uploaded.file_id);
            Ok(())
        }

        Command::Status => {
            enter(&state, Route::Landing)?;
            println!("API:     {}", manager.api().base_url());
            match manager.api().health_check().await {
                Ok(health) if health.is_healthy() => {
                    println!(
                        "Server:  healthy{}",
                        health.version.map(|v| format!(" (v{})", v)).unwrap_or_default()
                    );
                }
                Ok(health) => println!(
                    "Server:  degraded (database: {})",
                    format_optional(&health.database, "unknown")
                ),
                Err(e) => println!("Server:  unreachable ({})", e),
            }
            match manager.user() {
                Some(user) if manager.is_authenticated() => {
                    println!("Session: signed in as {}", user.email)
                }
                _ => println!("Session: signed out"),
            }
            Ok(())
        }
    }
}

async fn run_deceased(
    manager: &SessionManager,
    state: &SessionState,
    command: DeceasedCommand,
) -> Result<()> {
    let api = manager.api();

    match command {
        DeceasedCommand::List {
            search,
            family,
            skip,
            limit,
        } => {
            enter(state, Route::DeceasedList)?;
            let query = ProfileQuery {
                skip: Some(skip),
                limit: Some(limit),
                family_id: family,
                search,
            };
            let list = api.list_deceased_profiles(&query).await?;
            if list.profiles.is_empty() {
                println!("No profiles found");
                return Ok(());
            }
            for profile in &list.profiles {
                println!(
                    "{:<38} {:<32} {:<8} {}",
                    profile.id,
                    truncate_string(&profile.display_name(), 32),
                    profile.privacy_level,
                    profile.life_span().unwrap_or_default()
                );
            }
            println!(
                "Showing {}-{} of {}",
                list.skip + 1,
                list.skip as usize + list.profiles.len(),
                list.total
            );
            if list.has_more() {
                println!("More: --skip {}", list.skip as usize + list.profiles.len());
            }
            Ok(())
        }

        DeceasedCommand::Show { id, json } => {
            enter(state, Route::DeceasedDetail(id.clone()))?;
            let profile = api.get_deceased_profile(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }
            println!("{}", profile.display_name());
            if let Some(span) = profile.life_span() {
                println!("  {}", span);
            }
            println!("  gender:       {:?}", profile.gender);
            println!("  privacy:      {}", profile.privacy_level);
            println!("  born:         {}", format_optional(&profile.birth_place, "-"));
            println!("  died:         {}", format_optional(&profile.death_place, "-"));
            println!("  resting:      {}", format_optional(&profile.resting_place, "-"));
            if let Some(ref bio) = profile.biography {
                println!();
                println!("{}", bio);
            }
            Ok(())
        }

        DeceasedCommand::Create {
            name,
            gender,
            birth_date,
            death_date,
            death_date_lunar,
            privacy,
            family,
        } => {
            enter(state, Route::DeceasedNew)?;
            let Some(gender) = Gender::parse(&gender) else {
                bail!("Unknown gender '{}': use male, female or other", gender);
            };
            let mut profile = DeceasedProfileCreate::new(&name, gender);
            profile.birth_date = birth_date;
            profile.death_date = death_date;
            profile.death_date_lunar = death_date_lunar;
            profile.family_id = family;
            if let Some(privacy) = privacy {
                profile.privacy_level = PrivacyLevel::parse(&privacy).with_context(|| {
                    format!("Unknown privacy level '{}': use public, family or private", privacy)
                })?;
            }

            let created = api.create_deceased_profile(&profile).await?;
            println!("Created {} ({})", created.display_name(), created.id);
            Ok(())
        }

        DeceasedCommand::Edit {
            id,
            name,
            gender,
            birth_date,
            death_date,
            death_date_lunar,
            resting_place,
            privacy,
        } => {
            enter(state, Route::DeceasedEdit(id.clone()))?;
            let gender = match gender {
                Some(raw) => Some(Gender::parse(&raw).with_context(|| {
                    format!("Unknown gender '{}': use male, female or other", raw)
                })?),
                None => None,
            };
            let privacy_level = match privacy {
                Some(raw) => Some(PrivacyLevel::parse(&raw).with_context(|| {
                    format!("Unknown privacy level '{}': use public, family or private", raw)
                })?),
                None => None,
            };
            let patch = DeceasedProfileUpdate {
                vietnamese_name: name,
                gender,
                birth_date,
                death_date,
                death_date_lunar,
                resting_place,
                privacy_level,
                ..DeceasedProfileUpdate::default()
            };

            let updated = api.update_deceased_profile(&id, &patch).await?;
            println!("Updated {} ({})", updated.display_name(), updated.id);
            Ok(())
        }

        DeceasedCommand::Delete { id } => {
            enter(state, Route::DeceasedEdit(id.clone()))?;
            api.delete_deceased_profile(&id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}
