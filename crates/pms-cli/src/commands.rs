use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use pms_core::api::{Attachment, UpdateMode};
use pms_core::auth::{SessionStatus, AUTH_PATH};
use pms_core::models::{Credentials, PastorForm, Registration};
use pms_core::{ApiClient, Config};
use tracing::warn;

pub const USAGE: &str = "\
Usage: pms <command> [args]

Commands:
  login [email]                              Sign in
  register <email> <first> <last> <phone> [picture]
                                             Create an administrator account
  logout                                     Sign out
  status                                     Show the current session
  pastors [search]                           List pastors
  pastor <id>                                Show one pastor
  set-photo <id> <file>                      Upload a pastor's photograph
  hierarchy                                  Show zones, areas and parishes
  help                                       Show this message

Environment:
  PMS_API_BASE   API origin (default http://127.0.0.1:8000)
  RUST_LOG       Log filter (default warn)";

/// Screen the dashboard commands belong to
const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: Option<String> },
    Register {
        email: String,
        first_name: String,
        last_name: String,
        phone_number: String,
        picture: Option<PathBuf>,
    },
    Logout,
    Status,
    Pastors { search: Option<String> },
    Pastor { id: i64 },
    SetPhoto { id: i64, file: PathBuf },
    Hierarchy,
    Help,
}

fn parse_id(value: Option<&String>) -> Result<i64> {
    let value = value.context("missing <id>")?;
    value
        .parse()
        .with_context(|| format!("invalid id: {}", value))
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        Ok(match name.as_str() {
            "login" => Command::Login {
                email: rest.first().cloned(),
            },
            "register" => {
                if rest.len() < 4 {
                    bail!("register needs <email> <first> <last> <phone>");
                }
                Command::Register {
                    email: rest[0].clone(),
                    first_name: rest[1].clone(),
                    last_name: rest[2].clone(),
                    phone_number: rest[3].clone(),
                    picture: rest.get(4).map(PathBuf::from),
                }
            }
            "logout" => Command::Logout,
            "status" => Command::Status,
            "pastors" => Command::Pastors {
                search: (!rest.is_empty()).then(|| rest.join(" ")),
            },
            "pastor" => Command::Pastor {
                id: parse_id(rest.first())?,
            },
            "set-photo" => Command::SetPhoto {
                id: parse_id(rest.first())?,
                file: rest.get(1).map(PathBuf::from).context("missing <file>")?,
            },
            "hierarchy" => Command::Hierarchy,
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("unknown command: {}", other),
        })
    }

    /// Screen this command runs on; the sign-in commands live on the
    /// authentication screen, everything else on the dashboard.
    pub fn screen(&self) -> &'static str {
        match self {
            Command::Login { .. } | Command::Register { .. } | Command::Help => AUTH_PATH,
            _ => DASHBOARD_PATH,
        }
    }

    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Register { .. } | Command::Status | Command::Help
        )
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

pub async fn run(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    if command.needs_session() && !client.session().is_authenticated() {
        bail!("Not signed in. Run `pms login` first.");
    }

    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            let status = client
                .login(&Credentials {
                    email: email.clone(),
                    password,
                })
                .await?;

            config.last_email = Some(email.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }

            match status {
                SessionStatus::Active {
                    expires_at: Some(expires_at),
                } => println!(
                    "Signed in as {} (session expires {})",
                    email,
                    expires_at.with_timezone(&chrono::Local).format("%b %d, %Y %H:%M")
                ),
                SessionStatus::Active { expires_at: None } => println!("Signed in as {}", email),
                _ => bail!("The server issued a token that has already expired"),
            }
        }
        Command::Register {
            email,
            first_name,
            last_name,
            phone_number,
            picture,
        } => {
            let password = rpassword::prompt_password("Password: ")?;
            let password2 = rpassword::prompt_password("Confirm password: ")?;
            let profile_picture = match picture {
                Some(path) => Some(
                    Attachment::from_path(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let registration = Registration {
                email,
                first_name,
                last_name,
                phone_number,
                password,
                password2,
                profile_picture,
            };
            if !registration.passwords_match() {
                bail!("Passwords do not match");
            }
            client.auth().register(&registration).await?;
            println!("Registration successful! You can now log in.");
        }
        Command::Logout => {
            client.sign_out().await;
            println!("Signed out.");
        }
        Command::Status => {
            let session = client.session();
            match session.status() {
                SessionStatus::NoSession => println!("Not signed in."),
                SessionStatus::Expired => println!("Session expired."),
                SessionStatus::Active { expires_at } => {
                    let who = session
                        .user()
                        .map(|u| u.display_name())
                        .unwrap_or_else(|| "unknown user".to_string());
                    match expires_at {
                        Some(at) => println!(
                            "Signed in as {} until {}",
                            who,
                            at.with_timezone(&chrono::Local).format("%b %d, %Y %H:%M")
                        ),
                        None => println!("Signed in as {} (expiry unknown)", who),
                    }
                }
            }
        }
        Command::Pastors { search } => {
            let pastors = client.search_pastors(search.as_deref()).await?;
            if pastors.is_empty() {
                println!("No pastors found.");
            }
            for pastor in pastors {
                println!(
                    "{:>6}  {:<40}  {}",
                    pastor.id.map(|id| id.to_string()).unwrap_or_default(),
                    pastor.display_name(),
                    pastor.phone.as_deref().unwrap_or("")
                );
            }
        }
        Command::Pastor { id } => {
            let pastor = client.pastors().retrieve(id).await?;
            println!("{}", serde_json::to_string_pretty(&pastor)?);
        }
        Command::SetPhoto { id, file } => {
            let photograph = Attachment::from_path(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let pastor = client.pastors().retrieve(id).await?;
            let mut form = PastorForm::from_record(&pastor);
            form.photograph = Some(photograph);
            let updated = client.update_pastor(id, &form, UpdateMode::Partial).await?;
            println!("Updated photograph for {}", updated.display_name());
        }
        Command::Hierarchy => {
            let hierarchy = client.fetch_hierarchy().await?;
            for zone in &hierarchy.zones {
                println!("{}", zone.name);
                let Some(zone_id) = zone.id else { continue };
                for area in hierarchy.areas_in(zone_id) {
                    println!("  {}", area.name);
                    let Some(area_id) = area.id else { continue };
                    for parish in hierarchy.parishes_in(area_id) {
                        println!("    {}", parish.name);
                    }
                }
            }
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}
