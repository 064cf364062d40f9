use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use tabled::Tabled;
use time::OffsetDateTime;

use montse::{
    core::model::{self as domain, hours_minutes, query::Period as DomainPeriod},
    routes::Route,
};

#[derive(Subcommand)]
pub enum Command {
    /// Tells whether to log in or register with this address
    CheckEmail { email: String },
    Register(Registration),
    Login(Credentials),
    Logout,
    Profile,
    Books {
        #[arg(long, value_enum, default_value_t = View::All)]
        view: View,

        #[arg(long, help = "Also count readers of each title across all users")]
        readers: bool,
    },
    Search { query: String },
    Add(AddFromSearch),
    AddManual(ManualEntry),
    Start { id: String },
    Finish { id: String },
    Remove {
        id: String,

        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    Stats {
        #[arg(long, value_enum, default_value_t = Period::Month)]
        period: Period,
    },
    Goal {
        #[arg(long, help = "Number of books to finish")]
        set: Option<u32>,

        #[arg(long, conflicts_with = "set")]
        clear: bool,
    },
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

impl Command {
    /// The page this command stands in for, which decides whether it needs
    /// a session.
    pub fn route(&self) -> Route {
        match self {
            Command::CheckEmail { .. } | Command::Logout | Command::Theme { .. } => Route::Start,
            Command::Register(..) => Route::Register,
            Command::Login(..) => Route::Login,
            Command::Books { .. }
            | Command::Start { .. }
            | Command::Finish { .. }
            | Command::Remove { .. } => Route::Home,
            Command::Search { .. } | Command::Add(..) | Command::AddManual(..) => Route::Explore,
            Command::Profile | Command::Stats { .. } | Command::Goal { .. } => Route::Profile,
        }
    }

    /// Whether the command shows or looks up books, and so needs the list
    /// loaded first.
    pub fn reads_books(&self) -> bool {
        matches!(
            self,
            Command::Books { .. }
                | Command::Start { .. }
                | Command::Finish { .. }
                | Command::Remove { .. }
                | Command::Profile
                | Command::Stats { .. }
        )
    }
}

#[derive(Parser)]
pub struct Registration {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Parser)]
pub struct Credentials {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Parser)]
pub struct AddFromSearch {
    #[arg(long, help = "Text to search the catalog for")]
    pub query: String,

    #[arg(long, help = "Position of the result to add, starting at 1")]
    pub pick: usize,

    #[arg(long, value_enum, default_value_t = Status::Later)]
    pub status: Status,
}

#[derive(Parser)]
pub struct ManualEntry {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub author: String,

    #[arg(long, help = "URL of a cover image")]
    pub cover: Option<String>,

    #[arg(long, value_enum, default_value_t = Status::Later)]
    pub status: Status,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Status {
    Reading,
    Later,
}

impl From<Status> for domain::InitialStatus {
    fn from(value: Status) -> Self {
        match value {
            Status::Reading => domain::InitialStatus::Reading,
            Status::Later => domain::InitialStatus::Later,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum View {
    All,
    Reading,
    Finished,
    Later,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Period {
    Week,
    Month,
    Year,
}

impl From<Period> for DomainPeriod {
    fn from(value: Period) -> Self {
        match value {
            Period::Week => DomainPeriod::Week,
            Period::Month => DomainPeriod::Month,
            Period::Year => DomainPeriod::Year,
        }
    }
}

#[derive(Tabled)]
pub struct BookRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Readers")]
    readers: String,
}

impl BookRow {
    pub fn new(book: &domain::Book, now: OffsetDateTime) -> Self {
        let domain::Book { id, info } = book;
        let time = match info.status {
            domain::BookStatus::Reading => info.elapsed(now).map(hours_minutes),
            domain::BookStatus::Finished => info.total_time.map(hours_minutes),
            domain::BookStatus::Later => None,
        };

        Self {
            id: id.to_string(),
            title: info.title.clone(),
            author: info.author.clone(),
            status: info.status.to_string(),
            time: time.unwrap_or_default(),
            readers: info
                .total_readers
                .map(|count| count.to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
pub struct CandidateRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
}

impl CandidateRow {
    pub fn numbered(candidates: &[domain::Candidate]) -> Vec<Self> {
        candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| Self {
                position: index + 1,
                title: candidate.title.clone(),
                author: candidate.author.clone(),
            })
            .collect()
    }
}

/// A one line summary of a book, for confirmations.
pub struct Book<'a>(pub &'a domain::Book);

impl fmt::Display for Book<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(domain::Book {
            id,
            info: domain::BookInfo { title, author, .. },
        }) = self;
        write!(f, "{title} by {author} [{id}]")
    }
}
