mod helpers;
mod lifecycle;
mod raw;
mod web_socket;
