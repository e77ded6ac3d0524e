//! Built-in command catalog, one module per area of the protocol.

mod channels;
mod command_list;
mod connection;
mod music_db;
mod outputs;
mod partition;
mod playback;
mod queue;
mod reflection;
mod status;
mod stored_playlists;
mod unsupported;

use crate::registry::CommandSpec;

pub(crate) fn catalog() -> impl Iterator<Item = &'static CommandSpec> {
    [
        connection::COMMANDS,
        command_list::COMMANDS,
        status::COMMANDS,
        playback::COMMANDS,
        queue::COMMANDS,
        stored_playlists::COMMANDS,
        music_db::COMMANDS,
        outputs::COMMANDS,
        channels::COMMANDS,
        partition::COMMANDS,
        reflection::COMMANDS,
        unsupported::COMMANDS,
    ]
    .into_iter()
    .flatten()
}
