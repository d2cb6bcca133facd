mod engine;
mod envelope;
mod stage;
