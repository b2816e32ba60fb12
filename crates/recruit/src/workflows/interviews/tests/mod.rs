mod availability;
mod common;
mod team_config;
