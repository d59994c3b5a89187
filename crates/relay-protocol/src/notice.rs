//! Display texts carried inside `MESSAGE` lines.
//!
//! Every function takes the `HH:mm` stamp explicitly so callers decide the
//! clock and tests stay deterministic.

use relay_core::MemberName;

/// `<name> has joined (<time>)`
pub fn joined(name: &MemberName, time: &str) -> String {
    format!("{name} has joined ({time})")
}

/// Sent only to the first member of an empty room.
pub fn first_member(time: &str) -> String {
    format!("You are the first to join and the coordinator of this chat ({time})")
}

/// `<name>(<time>): <text>`
pub fn chat(name: &MemberName, time: &str, text: &str) -> String {
    format!("{name}({time}): {text}")
}

/// Private message as seen by its recipient.
pub fn private_delivery(from: &MemberName, time: &str, body: &str) -> String {
    format!("{from}(pm)({time}): {body}")
}

/// Confirmation echoed to the sender of a delivered private message.
pub fn private_echo(to: &MemberName, time: &str, body: &str) -> String {
    format!("pm to {to}({time}): {body}")
}

/// Unknown private target or malformed private syntax.
pub fn wrong_command(time: &str) -> String {
    format!("Wrong use of command! ({time})")
}

/// `<name> has left (<time>)`
pub fn left(name: &MemberName, time: &str) -> String {
    format!("{name} has left ({time})")
}

/// Departure of the coordinator, naming its successor.
pub fn left_new_coordinator(name: &MemberName, successor: &MemberName, time: &str) -> String {
    format!("{name} has left. The new coordinator is: {successor}({time})")
}
