use cursive::{
    view::{Nameable, Resizable, Scrollable},
    views::{Button, Dialog, EditView, LinearLayout, Panel, SelectView, TextView},
    Cursive, View,
};
use time::{macros::format_description, OffsetDateTime};

use montse::{
    core::model::{
        hours_minutes,
        query::{BookById, Finished, Later, Period, Reading},
        Book, BookId, BookStatus, Candidate, InitialStatus,
    },
    routes::Route,
    search::SearchState,
    RemoteApplication,
};

use crate::UserInterface;

pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const NAME: &str = "name";
pub const ERROR: &str = "error";
pub const TITLE: &str = "title";
pub const AUTHOR: &str = "author";
pub const COVER: &str = "cover";
pub const GOAL: &str = "goal";
pub const BOOK_DIALOG: &str = "book dialog";

const READING_SHELF: &str = "shelf-reading";
const LATER_SHELF: &str = "shelf-later";
const FINISHED_SHELF: &str = "shelf-finished";
const RESULTS: &str = "results";
const SEARCH_STATUS: &str = "search-status";
const PROFILE_STATS: &str = "profile-stats";
const PERIOD: &str = "period";
const PERIOD_BOOKS: &str = "period-books";

const FIELD_WIDTH: usize = 40;

fn labelled<V: View>(label: &str, view: V) -> LinearLayout {
    LinearLayout::vertical()
        .child(TextView::new(label))
        .child(view)
}

fn error_line() -> impl View {
    TextView::new("").with_name(ERROR)
}

pub fn loading() -> impl View {
    Dialog::around(TextView::new("Loading..."))
}

pub fn start(ui: &UserInterface) -> impl View {
    let next = ui.clone();
    Dialog::around(
        LinearLayout::vertical()
            .child(TextView::new("Enter your email to log in or sign up."))
            .child(EditView::new().with_name(EMAIL).fixed_width(FIELD_WIDTH))
            .child(error_line()),
    )
    .title("Welcome to montse")
    .button("Continue", move |siv| next.continue_with_email(siv))
    .button("Quit", |siv| siv.quit())
}

pub fn login(ui: &UserInterface) -> impl View {
    let submit = ui.clone();
    let register = ui.clone();
    let back = ui.clone();
    Dialog::around(
        LinearLayout::vertical()
            .child(labelled(
                "Email",
                EditView::new().with_name(EMAIL).fixed_width(FIELD_WIDTH),
            ))
            .child(labelled(
                "Password",
                EditView::new()
                    .secret()
                    .with_name(PASSWORD)
                    .fixed_width(FIELD_WIDTH),
            ))
            .child(error_line()),
    )
    .title("Log in")
    .button("Log in", move |siv| submit.sign_in(siv))
    .button("Register instead", move |siv| {
        register.navigate(siv, Route::Register)
    })
    .button("Back", move |siv| back.navigate(siv, Route::Start))
}

pub fn register(ui: &UserInterface) -> impl View {
    let submit = ui.clone();
    let login = ui.clone();
    Dialog::around(
        LinearLayout::vertical()
            .child(labelled(
                "Name",
                EditView::new().with_name(NAME).fixed_width(FIELD_WIDTH),
            ))
            .child(labelled(
                "Email",
                EditView::new().with_name(EMAIL).fixed_width(FIELD_WIDTH),
            ))
            .child(labelled(
                "Password",
                EditView::new()
                    .secret()
                    .with_name(PASSWORD)
                    .fixed_width(FIELD_WIDTH),
            ))
            .child(error_line()),
    )
    .title("Create an account")
    .button("Sign up", move |siv| submit.register(siv))
    .button("Log in instead", move |siv| login.navigate(siv, Route::Login))
}

fn shelf(ui: &UserInterface, title: &str, name: &str) -> impl View {
    let ui = ui.clone();
    Panel::new(
        SelectView::<BookId>::new()
            .on_submit(move |siv, id: &BookId| book_actions(&ui, siv, id))
            .with_name(name),
    )
    .title(title)
}

pub fn home(ui: &UserInterface) -> impl View {
    let greeting = ui
        .app
        .session()
        .user()
        .map(|user| format!("Hello, {}!", user.greeting_name()))
        .unwrap_or_default();
    let count = ui.clone();
    let explore = ui.clone();

    LinearLayout::vertical()
        .child(TextView::new(greeting))
        .child(shelf(ui, "Currently reading", READING_SHELF))
        .child(shelf(ui, "Read later", LATER_SHELF))
        .child(shelf(ui, "Finished", FINISHED_SHELF))
        .child(
            LinearLayout::horizontal()
                .child(Button::new("Count readers", move |siv| {
                    count.count_readers(siv)
                }))
                .child(Button::new("Find a book", move |siv| {
                    explore.navigate(siv, Route::Explore)
                })),
        )
        .child(error_line())
        .child(TextView::new("Esc - menu. Ctrl-Q - exit."))
        .scrollable()
}

fn shelf_label(book: &Book, elapsed: Option<String>) -> String {
    let info = &book.info;
    let mut label = format!("{} by {}", info.title, info.author);
    match info.status {
        BookStatus::Reading => {
            if let Some(elapsed) = elapsed {
                label.push_str(&format!("  [{elapsed}]"));
            }
        }
        BookStatus::Finished => {
            if let Some(total) = info.total_time {
                label.push_str(&format!("  [{}]", hours_minutes(total)));
            }
        }
        BookStatus::Later => {}
    }
    if let Some(readers) = info.total_readers {
        label.push_str(&format!("  {readers} reading now"));
    }
    label
}

pub fn show_shelves<F>(siv: &mut Cursive, app: &RemoteApplication, elapsed: F)
where
    F: Fn(&BookId) -> Option<String>,
{
    for (name, books) in [
        (READING_SHELF, app.issue(Reading)),
        (LATER_SHELF, app.issue(Later)),
        (FINISHED_SHELF, app.issue(Finished)),
    ] {
        siv.call_on_name(name, |view: &mut SelectView<BookId>| {
            let selected = view.selection().map(|id| (*id).clone());
            view.clear();
            for book in &books {
                view.add_item(shelf_label(book, elapsed(&book.id)), book.id.clone());
            }
            if let Some(index) = selected.and_then(|id| books.iter().position(|book| book.id == id)) {
                let _ = view.set_selection(index);
            }
        });
    }
}

fn date(instant: OffsetDateTime) -> String {
    instant
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| instant.to_string())
}

fn details(book: &Book) -> String {
    let info = &book.info;
    let mut lines = vec![
        format!("by {}", info.author),
        format!("Status: {}", info.status),
        format!("Cover: {}", info.cover_or_placeholder()),
    ];
    if let Some(start_time) = info.start_time {
        lines.push(format!("Started: {}", date(start_time)));
    }
    if let Some(elapsed) = info
        .elapsed(OffsetDateTime::now_utc())
        .filter(|_| info.status == BookStatus::Reading)
    {
        lines.push(format!("Reading for {}", hours_minutes(elapsed)));
    }
    if let (Some(total), Some(finished_at)) = (info.total_time, info.finished_at) {
        lines.push(format!(
            "Finished: {} after {}",
            date(finished_at),
            hours_minutes(total)
        ));
    }
    lines.join("\n")
}

fn book_actions(ui: &UserInterface, siv: &mut Cursive, id: &BookId) {
    let Some(book) = ui.app.issue(BookById(id.clone())) else {
        return;
    };

    let mut dialog = Dialog::around(TextView::new(details(&book))).title(book.info.title.clone());
    match book.info.status {
        BookStatus::Later => {
            let ui = ui.clone();
            let id = book.id.clone();
            dialog.add_button("Start reading", move |siv| ui.start_reading(siv, id.clone()));
        }
        BookStatus::Reading => {
            let ui = ui.clone();
            let id = book.id.clone();
            dialog.add_button("Finish", move |siv| ui.finish_reading(siv, id.clone()));
        }
        BookStatus::Finished => {}
    }

    let ui = ui.clone();
    dialog.add_button("Delete", move |siv| confirm_delete(&ui, siv, book.clone()));
    dialog.add_button("Close", |siv| {
        siv.pop_layer();
    });
    siv.add_layer(dialog.with_name(BOOK_DIALOG));
}

fn confirm_delete(ui: &UserInterface, siv: &mut Cursive, book: Book) {
    let ui = ui.clone();
    let question = format!("Are you sure you want to delete {}?", book.info.title);
    siv.add_layer(
        Dialog::text(question)
            .title("Delete book")
            .button("Delete", move |siv| {
                siv.pop_layer();
                ui.remove(siv, book.clone());
            })
            .button("Cancel", |siv| {
                siv.pop_layer();
            }),
    );
}

pub fn explore(ui: &UserInterface) -> impl View {
    let typing = ui.clone();
    let picking = ui.clone();
    let manual = ui.clone();

    LinearLayout::vertical()
        .child(TextView::new("Search the catalog by title, author or ISBN."))
        .child(
            EditView::new()
                .on_edit(move |_siv, text, _cursor| typing.search_input(text))
                .full_width(),
        )
        .child(TextView::new("").with_name(SEARCH_STATUS))
        .child(
            Panel::new(
                SelectView::<Candidate>::new()
                    .on_submit(move |siv, candidate: &Candidate| {
                        choose_status(&picking, siv, candidate.clone())
                    })
                    .with_name(RESULTS)
                    .scrollable(),
            )
            .title("Results"),
        )
        .child(Button::new("Add manually", move |siv| manual_entry(&manual, siv)))
        .child(error_line())
}

pub fn show_search_state(siv: &mut Cursive, state: &SearchState) {
    let status = match state {
        SearchState::Idle => String::new(),
        SearchState::Searching(query) => format!("Searching for {query}..."),
        SearchState::Results(candidates) if candidates.is_empty() => "No books found.".to_owned(),
        SearchState::Results(candidates) => format!("{} result(s)", candidates.len()),
        SearchState::Failed(message) => format!("Search failed: {message}"),
    };
    siv.call_on_name(SEARCH_STATUS, |view: &mut TextView| view.set_content(status));

    if matches!(state, SearchState::Searching(..)) {
        return;
    }
    siv.call_on_name(RESULTS, |view: &mut SelectView<Candidate>| {
        view.clear();
        if let SearchState::Results(candidates) = state {
            for candidate in candidates {
                view.add_item(
                    format!("{} by {}", candidate.title, candidate.author),
                    candidate.clone(),
                );
            }
        }
    });
}

fn choose_status(ui: &UserInterface, siv: &mut Cursive, candidate: Candidate) {
    let reading = (ui.clone(), candidate.clone());
    let later = (ui.clone(), candidate.clone());
    siv.add_layer(
        Dialog::text(format!("{} by {}", candidate.title, candidate.author))
            .title("Add to your shelf")
            .button("Start reading", move |siv| {
                let (ui, candidate) = &reading;
                siv.pop_layer();
                ui.add_candidate(siv, candidate.clone(), InitialStatus::Reading);
            })
            .button("Read later", move |siv| {
                let (ui, candidate) = &later;
                siv.pop_layer();
                ui.add_candidate(siv, candidate.clone(), InitialStatus::Later);
            })
            .button("Cancel", |siv| {
                siv.pop_layer();
            }),
    );
}

fn manual_entry(ui: &UserInterface, siv: &mut Cursive) {
    let reading = ui.clone();
    let later = ui.clone();
    siv.add_layer(
        Dialog::around(
            LinearLayout::vertical()
                .child(labelled(
                    "Title",
                    EditView::new().with_name(TITLE).fixed_width(FIELD_WIDTH),
                ))
                .child(labelled(
                    "Author",
                    EditView::new().with_name(AUTHOR).fixed_width(FIELD_WIDTH),
                ))
                .child(labelled(
                    "Cover image URL (optional)",
                    EditView::new().with_name(COVER).fixed_width(FIELD_WIDTH),
                )),
        )
        .title("Add a book manually")
        .button("Start reading", move |siv| {
            reading.add_manual(siv, InitialStatus::Reading)
        })
        .button("Read later", move |siv| later.add_manual(siv, InitialStatus::Later))
        .button("Cancel", |siv| {
            siv.pop_layer();
        }),
    );
}

pub fn profile(ui: &UserInterface) -> impl View {
    let (name, email) = ui
        .app
        .session()
        .user()
        .map(|user| (user.greeting_name().to_owned(), user.email))
        .unwrap_or_default();
    let periods = ui.clone();
    let goal = ui.clone();
    let sign_out = ui.clone();

    LinearLayout::vertical()
        .child(TextView::new(format!("{name} <{email}>")))
        .child(Panel::new(TextView::new("").with_name(PROFILE_STATS)).title("Your reading"))
        .child(
            Panel::new(
                LinearLayout::vertical()
                    .child(
                        SelectView::<Period>::new()
                            .popup()
                            .with_all(Period::ALL.map(|period| (format!("This {period}"), period)))
                            .selected(1)
                            .on_submit(move |siv, _: &Period| show_profile(siv, &periods.app))
                            .with_name(PERIOD),
                    )
                    .child(TextView::new("").with_name(PERIOD_BOOKS)),
            )
            .title("Finished"),
        )
        .child(
            LinearLayout::horizontal()
                .child(Button::new("Set goal", move |siv| goal_dialog(&goal, siv)))
                .child(Button::new("Sign out", move |siv| sign_out.sign_out(siv))),
        )
        .child(error_line())
        .scrollable()
}

pub fn show_profile(siv: &mut Cursive, app: &RemoteApplication) {
    let goal = match (app.goal(), app.goal_progress()) {
        (Ok(Some(goal)), Ok(progress)) => format!("Reading goal: {goal} books, {progress:.0}% done"),
        (Ok(None), _) => "No reading goal set.".to_owned(),
        (Err(error), _) | (_, Err(error)) => format!("Reading goal unavailable: {error}"),
    };
    let stats = format!(
        "Reading: {}\nFinished: {}\nRead later: {}\n{goal}",
        app.issue(Reading).len(),
        app.issue(Finished).len(),
        app.issue(Later).len(),
    );
    siv.call_on_name(PROFILE_STATS, |view: &mut TextView| view.set_content(stats));

    let period = siv
        .call_on_name(PERIOD, |view: &mut SelectView<Period>| {
            view.selection().map(|period| *period)
        })
        .flatten()
        .unwrap_or(Period::Month);
    let books = app.finished_within(period);
    let mut listing = format!("{} book(s) this {period}", books.len());
    for book in &books {
        listing.push_str(&format!("\n  {} by {}", book.info.title, book.info.author));
    }
    siv.call_on_name(PERIOD_BOOKS, |view: &mut TextView| view.set_content(listing));
}

fn goal_dialog(ui: &UserInterface, siv: &mut Cursive) {
    let current = ui
        .app
        .goal()
        .ok()
        .flatten()
        .map(|goal| goal.to_string())
        .unwrap_or_default();
    let save = ui.clone();
    siv.add_layer(
        Dialog::around(labelled(
            "Books to finish (empty to clear)",
            EditView::new()
                .content(current)
                .with_name(GOAL)
                .fixed_width(FIELD_WIDTH),
        ))
        .title("Reading goal")
        .button("Save", move |siv| save.set_goal(siv))
        .button("Cancel", |siv| {
            siv.pop_layer();
        }),
    );
}
