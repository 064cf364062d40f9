use cursive::{
    event::{Event, Key},
    views::{Dialog, EditView, TextView},
    Cursive,
};
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};

use montse::{
    config::Config,
    core::model::{Book, BookId, Candidate, InitialStatus},
    error::Result,
    infrastructure::remote::RemoteCatalog,
    logging,
    routes::{Guarded, Route},
    search::DebouncedSearch,
    ticker::ReadingTicker,
    RemoteApplication,
};

mod pages;
mod palette;

fn lock<A>(mutex: &Mutex<A>) -> MutexGuard<'_, A> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cursive callbacks run on the main thread. Remote work is spawned on the
/// runtime and its outcome is handed back through the callback sink.
#[derive(Clone)]
struct UserInterface {
    app: Arc<RemoteApplication>,
    runtime: Handle,
    ticker: Arc<Mutex<ReadingTicker>>,
    search: Arc<Mutex<DebouncedSearch<RemoteCatalog>>>,
    route: Arc<Mutex<Route>>,
}

impl UserInterface {
    fn new(app: Arc<RemoteApplication>, runtime: Handle) -> Self {
        Self {
            ticker: Arc::new(Mutex::new(app.reading_ticker())),
            search: Arc::new(Mutex::new(app.debounced_search())),
            route: Arc::new(Mutex::new(Route::Home)),
            app,
            runtime,
        }
    }

    fn start(self) {
        let mut siv = cursive::default();
        let theme = self.app.theme().unwrap_or_else(|error| {
            warn!(%error, "could not read the theme");
            Default::default()
        });
        palette::apply(&mut siv, theme);

        siv.add_global_callback(Key::Esc, |s| s.select_menubar());
        siv.add_global_callback(Event::CtrlChar('q'), |s| s.quit());

        self.watch(&siv);
        self.navigate(&mut siv, Route::Home);

        let app = Arc::clone(&self.app);
        self.perform(
            &mut siv,
            async move { app.start().await },
            |siv, result| {
                if let Err(error) = result {
                    show_error(siv, &error.to_string());
                }
            },
        );

        siv.run();
    }

    fn perform<A, F, D>(&self, siv: &mut Cursive, work: F, done: D)
    where
        A: Send + 'static,
        F: Future<Output = Result<A>> + Send + 'static,
        D: FnOnce(&mut Cursive, Result<A>) + Send + 'static,
    {
        let sink = siv.cb_sink().clone();
        self.runtime.spawn(async move {
            let result = work.await;
            if sink.send(Box::new(move |siv: &mut Cursive| done(siv, result))).is_err() {
                warn!("interface closed before an operation finished");
            }
        });
    }

    /// Redraws dependent views whenever the book list, the reading timers,
    /// the search or the session change.
    fn watch(&self, siv: &Cursive) {
        let sink = siv.cb_sink().clone();

        let mut books = self.app.books().subscribe();
        let ui = self.clone();
        let books_sink = sink.clone();
        self.runtime.spawn(async move {
            while books.changed().await.is_ok() {
                let snapshot = books.borrow_and_update().clone();
                lock(&ui.ticker).sync(&snapshot);
                let ui = ui.clone();
                if books_sink.send(Box::new(move |siv: &mut Cursive| ui.refresh(siv))).is_err() {
                    break;
                }
            }
        });

        let mut displays = lock(&self.ticker).subscribe();
        let ui = self.clone();
        let ticker_sink = sink.clone();
        self.runtime.spawn(async move {
            while displays.changed().await.is_ok() {
                let ui = ui.clone();
                if ticker_sink.send(Box::new(move |siv: &mut Cursive| ui.refresh_shelves(siv))).is_err() {
                    break;
                }
            }
        });

        let mut search = lock(&self.search).subscribe();
        let search_sink = sink.clone();
        self.runtime.spawn(async move {
            while search.changed().await.is_ok() {
                let state = search.borrow_and_update().clone();
                if search_sink.send(Box::new(move |siv: &mut Cursive| pages::show_search_state(siv, &state))).is_err() {
                    break;
                }
            }
        });

        let mut auth = self.app.session().subscribe();
        let ui = self.clone();
        self.runtime.spawn(async move {
            while auth.changed().await.is_ok() {
                let ui = ui.clone();
                let revisit = move |siv: &mut Cursive| {
                    let route = *lock(&ui.route);
                    if route.requires_session() {
                        ui.navigate(siv, route);
                    }
                };
                if sink.send(Box::new(revisit)).is_err() {
                    break;
                }
            }
        });
    }

    fn navigate(&self, siv: &mut Cursive, route: Route) {
        *lock(&self.route) = route;
        match self.app.guard(route) {
            Guarded::Render(route) => self.render(siv, route),
            Guarded::Pending => self.replace_page(siv, route, pages::loading()),
            Guarded::Redirect(target) => {
                info!(from = %route, to = %target, "redirecting");
                self.navigate(siv, target)
            }
        }
    }

    fn render(&self, siv: &mut Cursive, route: Route) {
        match route {
            Route::Start => self.replace_page(siv, route, pages::start(self)),
            Route::Login => self.replace_page(siv, route, pages::login(self)),
            Route::Register => self.replace_page(siv, route, pages::register(self)),
            Route::Home => {
                self.replace_page(siv, route, pages::home(self));
                self.refresh(siv);
            }
            Route::Explore => {
                self.replace_page(siv, route, pages::explore(self));
                pages::show_search_state(siv, &lock(&self.search).state());
            }
            Route::Profile => {
                self.replace_page(siv, route, pages::profile(self));
                self.refresh(siv);
            }
        }
    }

    fn replace_page<V>(&self, siv: &mut Cursive, route: Route, page: V)
    where
        V: cursive::View,
    {
        while siv.pop_layer().is_some() {}

        siv.menubar().clear();
        if route.shows_navbar() {
            self.navbar(siv);
            siv.set_autohide_menu(false);
        } else {
            siv.set_autohide_menu(true);
        }
        siv.add_fullscreen_layer(page);
    }

    fn navbar(&self, siv: &mut Cursive) {
        for (label, route) in [
            ("Home", Route::Home),
            ("Explore", Route::Explore),
            ("Profile", Route::Profile),
        ] {
            let ui = self.clone();
            siv.menubar()
                .add_leaf(label, move |siv| ui.navigate(siv, route));
        }

        let ui = self.clone();
        siv.menubar().add_leaf("Theme", move |siv| ui.toggle_theme(siv));
        let ui = self.clone();
        siv.menubar().add_leaf("Sign out", move |siv| ui.sign_out(siv));
    }

    fn refresh(&self, siv: &mut Cursive) {
        self.refresh_shelves(siv);
        pages::show_profile(siv, &self.app);
    }

    fn refresh_shelves(&self, siv: &mut Cursive) {
        let ticker = lock(&self.ticker);
        pages::show_shelves(siv, &self.app, |id| ticker.display(id));
    }

    fn continue_with_email(&self, siv: &mut Cursive) {
        let email = field(siv, pages::EMAIL);
        let app = Arc::clone(&self.app);
        let ui = self.clone();
        self.perform(
            siv,
            async move { app.check_email(&email).await },
            move |siv, result| match result {
                Ok((email, next)) => {
                    ui.navigate(siv, next);
                    siv.call_on_name(pages::EMAIL, |view: &mut EditView| {
                        view.set_content(email);
                    });
                }
                Err(error) => show_error(siv, &error.to_string()),
            },
        );
    }

    fn sign_in(&self, siv: &mut Cursive) {
        let email = field(siv, pages::EMAIL);
        let password = field(siv, pages::PASSWORD);
        let app = Arc::clone(&self.app);
        let ui = self.clone();
        self.perform(
            siv,
            async move { app.sign_in(&email, &password).await },
            move |siv, result| match result {
                Ok(_) => ui.navigate(siv, Route::Home),
                Err(error) => show_error(siv, &error.to_string()),
            },
        );
    }

    fn register(&self, siv: &mut Cursive) {
        let name = field(siv, pages::NAME);
        let email = field(siv, pages::EMAIL);
        let password = field(siv, pages::PASSWORD);
        let app = Arc::clone(&self.app);
        let ui = self.clone();
        self.perform(
            siv,
            async move { app.register(&name, &email, &password).await },
            move |siv, result| match result {
                Ok(_) => ui.navigate(siv, Route::Home),
                Err(error) => show_error(siv, &error.to_string()),
            },
        );
    }

    fn sign_out(&self, siv: &mut Cursive) {
        match self.app.sign_out() {
            Ok(()) => {
                lock(&self.ticker).clear();
                self.navigate(siv, Route::Login)
            }
            Err(error) => show_error(siv, &error.to_string()),
        }
    }

    fn toggle_theme(&self, siv: &mut Cursive) {
        match self.app.toggle_theme() {
            Ok(theme) => palette::apply(siv, theme),
            Err(error) => show_error(siv, &error.to_string()),
        }
    }

    fn search_input(&self, text: &str) {
        lock(&self.search).input(text);
    }

    fn add_candidate(&self, siv: &mut Cursive, candidate: Candidate, initial: InitialStatus) {
        let app = Arc::clone(&self.app);
        self.perform(
            siv,
            async move { app.add_candidate(&candidate, initial).await },
            |siv, result| match result {
                Ok(book) => {
                    siv.add_layer(Dialog::info(format!("Added {}", book.info.title)));
                }
                Err(error) => show_error(siv, &error.to_string()),
            },
        );
    }

    fn add_manual(&self, siv: &mut Cursive, initial: InitialStatus) {
        let title = field(siv, pages::TITLE);
        let author = field(siv, pages::AUTHOR);
        let cover = Some(field(siv, pages::COVER)).filter(|cover| !cover.trim().is_empty());
        let app = Arc::clone(&self.app);
        self.perform(
            siv,
            async move { app.add_manual(&title, &author, cover, initial).await },
            |siv, result| match result {
                Ok(book) => {
                    siv.pop_layer();
                    siv.add_layer(Dialog::info(format!("Added {}", book.info.title)));
                }
                Err(error) => siv.add_layer(Dialog::info(error.to_string())),
            },
        );
    }

    fn start_reading(&self, siv: &mut Cursive, id: BookId) {
        let app = Arc::clone(&self.app);
        self.perform(siv, async move { app.start_reading(&id).await }, closed);
    }

    fn finish_reading(&self, siv: &mut Cursive, id: BookId) {
        let app = Arc::clone(&self.app);
        self.perform(siv, async move { app.finish_reading(&id).await }, closed);
    }

    fn remove(&self, siv: &mut Cursive, book: Book) {
        let app = Arc::clone(&self.app);
        self.perform(siv, async move { app.remove(&book.id).await }, closed);
    }

    fn count_readers(&self, siv: &mut Cursive) {
        let app = Arc::clone(&self.app);
        self.perform(
            siv,
            async move { app.annotate_total_readers().await },
            |siv, result| {
                if let Err(error) = result {
                    show_error(siv, &error.to_string());
                }
            },
        );
    }

    fn set_goal(&self, siv: &mut Cursive) {
        let text = field(siv, pages::GOAL);
        let goal = match text.trim() {
            "" => Ok(None),
            digits => digits.parse::<u32>().map(Some),
        };
        let result = match goal {
            Ok(goal) => self.app.set_goal(goal).map_err(|error| error.to_string()),
            Err(_) => Err(format!("{text} is not a number of books")),
        };
        match result {
            Ok(()) => {
                siv.pop_layer();
                self.refresh(siv);
            }
            Err(message) => siv.add_layer(Dialog::info(message)),
        }
    }
}

/// Closes the book dialog an action was started from, unless the reader
/// already did, and reports a failure on the page below.
fn closed(siv: &mut Cursive, result: Result<()>) {
    let screen = siv.screen_mut();
    if let Some(position) = screen.find_layer_from_name(pages::BOOK_DIALOG) {
        screen.remove_layer(position);
    }
    if let Err(error) = result {
        show_error(siv, &error.to_string());
    }
}

fn field(siv: &mut Cursive, name: &str) -> String {
    siv.call_on_name(name, |view: &mut EditView| view.get_content().to_string())
        .unwrap_or_default()
}

/// Inline when the page has room for it, as a dialog otherwise.
fn show_error(siv: &mut Cursive, message: &str) {
    let shown = siv.call_on_name(pages::ERROR, |view: &mut TextView| {
        view.set_content(message);
    });
    if shown.is_none() {
        siv.add_layer(Dialog::info(message));
    }
}

fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init_file(&config.data_dir)?;

    let runtime = Runtime::new()?;
    let _context = runtime.enter();

    let app = Arc::new(RemoteApplication::from_config(config)?);
    UserInterface::new(app, runtime.handle().clone()).start();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursive::view::Nameable;
    use montse::error::Error;

    #[test]
    fn closing_keeps_the_page_when_the_dialog_is_already_gone() {
        let mut siv = Cursive::new();
        siv.add_layer(TextView::new("shelves"));

        siv.add_layer(Dialog::text("Dune").with_name(pages::BOOK_DIALOG));
        closed(&mut siv, Ok(()));
        assert_eq!(siv.screen().len(), 1);

        closed(&mut siv, Ok(()));
        assert_eq!(siv.screen().len(), 1);

        closed(&mut siv, Err(Error::NotSignedIn));
        assert_eq!(siv.screen().len(), 2);
    }
}
