//! Terminal implementations of the session manager's side effects.
//!
//! A CLI cannot move the user between pages, so navigation becomes a hint
//! telling them which command to run next.

use std::io::{self, Write};

use hwtracker_core::auth::{Navigator, Notifier, Route};

#[derive(Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        match route {
            Route::Landing => println!("Signed out."),
            Route::SignIn => println!("Not signed in. Run `hwtracker login` to sign in."),
            Route::Protected => {
                println!("Signed in. Run `hwtracker homework list` to see your homework.")
            }
            Route::External(url) => {
                println!("Open this URL in your browser to sign in:\n\n  {}\n", url);
                println!("When the browser lands on the app page, run:\n\n  hwtracker callback '<that URL>'\n");
            }
            Route::EndSession(url) => {
                println!("Signed out. To also sign out of your identity provider, open:\n\n  {}\n", url);
            }
        }
    }
}

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "\n*** {} ***\n", message);
        let _ = stderr.flush();
    }
}
