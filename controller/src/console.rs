use anyhow::{bail, Context};
use tracing::{info, warn};

use breezer_common::{BreezerEngine, ChangeSet, EngineAction, GatePosition, FILTER_RESET_DAYS};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Change(ChangeSet),
    Boost(bool),
    Preset(String),
    ListPresets,
    FilterReset(u16),
    FactoryReset,
    ErrorsReset,
    ShowState,
}

pub fn parse(line: &str) -> anyhow::Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let verb = verb.to_ascii_lowercase();
    let arg = words.next();
    if let Some(extra) = words.next() {
        bail!("unexpected argument '{extra}'");
    }

    match (verb.as_str(), arg) {
        ("power", Some(value)) => switch(value, |c, on| c.power = Some(on)),
        ("heater", Some(value)) => switch(value, |c, on| c.heater = Some(on)),
        ("sound", Some(value)) => switch(value, |c, on| c.sound = Some(on)),
        ("led", Some(value)) => switch(value, |c, on| c.led = Some(on)),
        ("fan", Some(value)) => change(|c| {
            c.fan_speed = Some(value.parse().with_context(|| format!("bad fan speed '{value}'"))?);
            Ok(())
        }),
        ("temp", Some(value)) => change(|c| {
            c.target_temperature =
                Some(value.parse().with_context(|| format!("bad temperature '{value}'"))?);
            Ok(())
        }),
        ("gate", Some(value)) => change(|c| {
            let gate = match GatePosition::parse(value) {
                Some(gate @ (GatePosition::Outdoor | GatePosition::Indoor | GatePosition::Mixed)) => {
                    gate
                }
                _ => bail!("bad gate position '{value}'"),
            };
            c.gate_position = Some(gate);
            Ok(())
        }),
        ("boost", Some(value)) => Ok(ConsoleCommand::Boost(parse_switch(value)?)),
        ("preset", Some(name)) => Ok(ConsoleCommand::Preset(name.to_string())),
        ("presets", None) => Ok(ConsoleCommand::ListPresets),
        ("state", None) => Ok(ConsoleCommand::ShowState),
        ("factory", Some(word)) if is_reset(word) => Ok(ConsoleCommand::FactoryReset),
        ("errors", Some(word)) if is_reset(word) => Ok(ConsoleCommand::ErrorsReset),
        ("filter", Some(word)) if is_reset(word) => {
            Ok(ConsoleCommand::FilterReset(FILTER_RESET_DAYS))
        }
        _ => bail!("unknown command '{line}'"),
    }
}

/// `filter reset` takes an optional day count as a third word.
pub fn parse_line(line: &str) -> anyhow::Result<ConsoleCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if let [verb, word, days] = words.as_slice() {
        if !verb.eq_ignore_ascii_case("filter") || !is_reset(word) {
            return parse(line);
        }
        let days = days
            .parse()
            .with_context(|| format!("bad filter days '{days}'"))?;
        return Ok(ConsoleCommand::FilterReset(days));
    }
    parse(line)
}

fn is_reset(word: &str) -> bool {
    word.eq_ignore_ascii_case("reset")
}

fn change(
    configure: impl FnOnce(&mut ChangeSet) -> anyhow::Result<()>,
) -> anyhow::Result<ConsoleCommand> {
    let mut change = ChangeSet::default();
    configure(&mut change)?;
    Ok(ConsoleCommand::Change(change))
}

fn switch(value: &str, set: impl FnOnce(&mut ChangeSet, bool)) -> anyhow::Result<ConsoleCommand> {
    let on = parse_switch(value)?;
    change(|c| {
        set(c, on);
        Ok(())
    })
}

fn parse_switch(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => bail!("expected on or off, got '{value}'"),
    }
}

pub fn execute(engine: &mut BreezerEngine, command: ConsoleCommand) -> Vec<EngineAction> {
    match command {
        ConsoleCommand::Change(change) => engine.perform(change),
        ConsoleCommand::Boost(on) => engine.enable_boost(on, None),
        ConsoleCommand::Preset(name) => engine.enable_preset(&name, None),
        ConsoleCommand::ListPresets => {
            info!(
                "presets: {} (active: {})",
                engine.preset_names().join(", "),
                engine.active_preset()
            );
            Vec::new()
        }
        ConsoleCommand::FilterReset(days) => engine.reset_filter(days),
        ConsoleCommand::FactoryReset => engine.factory_reset(),
        ConsoleCommand::ErrorsReset => engine.reset_errors(),
        ConsoleCommand::ShowState => {
            match serde_json::to_string(engine.state()) {
                Ok(json) => info!("state: {json}"),
                Err(err) => warn!("state serialization failed: {err}"),
            }
            Vec::new()
        }
    }
}

pub fn handle_line(engine: &mut BreezerEngine, line: &str) -> Vec<EngineAction> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    match parse_line(line) {
        Ok(command) => execute(engine, command),
        Err(err) => {
            warn!("console: {err:#}");
            Vec::new()
        }
    }
}
