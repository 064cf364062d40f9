use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tabled::Table;
use time::OffsetDateTime;
use tracing::{debug, warn};

use montse::{
    config::Config,
    core::model::query::{BookById, Finished, Later, Reading},
    core::model::BookId,
    logging,
    routes::{Guarded, Route},
    RemoteApplication,
};

pub mod model;

#[derive(Parser)]
#[command(name = "montse")]
#[command(about = "A personal reading tracker")]
struct CliArgs {
    #[arg(long, help = "Directory for local state, overrides MONTSE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: model::Command,
}

struct ReadingTrackerApi(RemoteApplication);

impl ReadingTrackerApi {
    fn new(application: RemoteApplication) -> Self {
        Self(application)
    }

    async fn dispatch(&self, command: model::Command) -> Result<()> {
        let Self(app) = self;

        match app.guard(command.route()) {
            Guarded::Render(route) => debug!(%route, "dispatching"),
            Guarded::Pending => bail!("The session is still loading"),
            Guarded::Redirect(Route::Login) => bail!("Not signed in, run `montse login` first"),
            Guarded::Redirect(route) => bail!("Continue at {route}"),
        }

        if command.reads_books() {
            app.reload().await?;
        }

        match command {
            model::Command::CheckEmail { email } => {
                let (email, next) = app.check_email(&email).await?;
                if next == Route::Login {
                    println!("Welcome back, {email}. Continue with `montse login`.");
                } else {
                    println!("{email} is new here. Continue with `montse register`.");
                }
                Ok(())
            }
            model::Command::Register(model::Registration {
                name,
                email,
                password,
            }) => {
                let user = app.register(&name, &email, &password).await?;
                println!("Welcome, {}!", user.greeting_name());
                Ok(())
            }
            model::Command::Login(model::Credentials { email, password }) => {
                let user = app.sign_in(&email, &password).await?;
                println!(
                    "Welcome back, {}! {} book(s) on your shelf.",
                    user.greeting_name(),
                    app.books().snapshot().len()
                );
                Ok(())
            }
            model::Command::Logout => {
                app.sign_out()?;
                println!("Signed out.");
                Ok(())
            }
            model::Command::Profile => {
                let user = app.session().user()?;
                println!("{} <{}>", user.greeting_name(), user.email);
                println!("Reading:  {}", app.issue(Reading).len());
                println!("Finished: {}", app.issue(Finished).len());
                println!("Later:    {}", app.issue(Later).len());
                match app.goal()? {
                    Some(goal) => println!("Goal:     {goal} ({:.0}%)", app.goal_progress()?),
                    None => println!("Goal:     not set"),
                }
                Ok(())
            }
            model::Command::Books { view, readers } => {
                if readers {
                    app.annotate_total_readers().await?;
                }
                let books = match view {
                    model::View::All => app.books().snapshot(),
                    model::View::Reading => app.issue(Reading),
                    model::View::Finished => app.issue(Finished),
                    model::View::Later => app.issue(Later),
                };
                if books.is_empty() {
                    println!("No books here yet.");
                } else {
                    let now = OffsetDateTime::now_utc();
                    let rows = books.iter().map(|book| model::BookRow::new(book, now));
                    println!("{}", Table::new(rows));
                }
                Ok(())
            }
            model::Command::Search { query } => {
                let candidates = app.search(&query).await?;
                if candidates.is_empty() {
                    println!("Nothing found for {query}.");
                } else {
                    println!("{}", Table::new(model::CandidateRow::numbered(&candidates)));
                }
                Ok(())
            }
            model::Command::Add(model::AddFromSearch {
                query,
                pick,
                status,
            }) => {
                let candidates = app.search(&query).await?;
                let candidate = pick
                    .checked_sub(1)
                    .and_then(|index| candidates.get(index))
                    .with_context(|| {
                        format!("Pick between 1 and {} for {query}", candidates.len())
                    })?;
                let book = app.add_candidate(candidate, status.into()).await?;
                println!("Added {}", model::Book(&book));
                Ok(())
            }
            model::Command::AddManual(model::ManualEntry {
                title,
                author,
                cover,
                status,
            }) => {
                let book = app.add_manual(&title, &author, cover, status.into()).await?;
                println!("Added {}", model::Book(&book));
                Ok(())
            }
            model::Command::Start { id } => {
                app.start_reading(&BookId(id)).await?;
                Ok(())
            }
            model::Command::Finish { id } => {
                let id = BookId(id);
                app.finish_reading(&id).await?;
                if let Some(book) = app.issue(BookById(id)) {
                    let row = model::BookRow::new(&book, OffsetDateTime::now_utc());
                    println!("{}", Table::new([row]));
                }
                Ok(())
            }
            model::Command::Remove { id, yes } => {
                let id = BookId(id);
                let Some(book) = app.issue(BookById(id.clone())) else {
                    println!("No book {id} on your shelf.");
                    return Ok(());
                };
                if yes || confirm(&format!("Remove {}?", model::Book(&book)))? {
                    app.remove(&id).await?;
                    println!("Removed.");
                }
                Ok(())
            }
            model::Command::Stats { period } => {
                let period = period.into();
                let books = app.finished_within(period);
                println!("Finished this {period}: {}", books.len());
                if !books.is_empty() {
                    let now = OffsetDateTime::now_utc();
                    let rows = books.iter().map(|book| model::BookRow::new(book, now));
                    println!("{}", Table::new(rows));
                }
                Ok(())
            }
            model::Command::Goal { set, clear } => {
                if clear {
                    app.set_goal(None)?;
                } else if set.is_some() {
                    app.set_goal(set)?;
                }
                match app.goal()? {
                    Some(goal) => match app.reload().await {
                        Ok(()) => println!(
                            "Goal: {goal} books, {:.0}% done",
                            app.goal_progress()?
                        ),
                        Err(error) => {
                            warn!(%error, "books unavailable, progress left out");
                            println!("Goal: {goal} books");
                        }
                    },
                    None => println!("No reading goal set."),
                }
                Ok(())
            }
            model::Command::Theme { toggle } => {
                let theme = if toggle {
                    app.toggle_theme()?
                } else {
                    app.theme()?
                };
                println!("Theme: {theme}");
                Ok(())
            }
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_stderr();

    let args = CliArgs::parse();
    let config = Config::load()?;
    let config = match args.data_dir {
        Some(data_dir) => config.with_data_dir(data_dir),
        None => config,
    };

    let application = RemoteApplication::from_config(config)?;
    application.restore().await?;

    ReadingTrackerApi::new(application)
        .dispatch(args.command)
        .await
}
