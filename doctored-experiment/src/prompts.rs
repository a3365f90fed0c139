//! On-screen wording. Key names come from the active key map.

use doctored_core::KeyMap;

pub fn instructions(keys: &KeyMap, response_window_ms: u64) -> String {
    format!(
        "Welcome to the experiment!\n\
         You will be presented with a series of photos.\n\
         If you believe the image has been modified by the experimenter, press '{reject}'.\n\
         If you believe the image is the original, press '{accept}'.\n\
         \n\
         Please respond as quickly as you can.\n\
         After {seconds} seconds the experiment will continue to the next image.\n\
         \n\
         Press any key to continue.",
        reject = keys.reject,
        accept = keys.accept,
        seconds = format_seconds(response_window_ms),
    )
}

pub fn comprehension_gate(keys: &KeyMap) -> String {
    let yes_keys = std::iter::once(keys.yes)
        .chain(keys.yes_aliases.iter().copied())
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(" or ");
    format!(
        "You will now see a series of questions that you must answer yes/no to.\n\
         \n\
         Press '{yes}' for yes and '{no}' for no.\n\
         Take as much time as you need.\n\
         \n\
         Press {yes_keys} to continue if you understand.",
        yes = keys.yes,
        no = keys.no,
    )
}

pub fn form_hint(keys: &KeyMap) -> String {
    format!(
        "Tab / arrows to move, left/right to change a choice, Enter to submit, {} to cancel.",
        keys.abort
    )
}

pub fn confirm_decline(keys: &KeyMap) -> String {
    format!(
        "End the session without your details?\n\
         Your image answers will still be saved.\n\
         \n\
         Press '{}' to end the session or '{}' to go back to the form.",
        keys.yes, keys.no
    )
}

pub const FAREWELL: &str = "Thank you for taking part!";

fn format_seconds(ms: u64) -> String {
    if ms % 1000 == 0 {
        (ms / 1000).to_string()
    } else {
        format!("{:.1}", ms as f64 / 1000.0)
    }
}
