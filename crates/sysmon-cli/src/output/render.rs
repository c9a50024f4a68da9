//! Human-readable rendering of topic results.

use serde_json::{Map, Value};

use crate::cli::Topic;

/// JSON key and the label shown for it.
type Field = (&'static str, &'static str);

const SYSTEM_FIELDS: &[Field] = &[
    ("name", "Node"),
    ("system", "System"),
    ("platform", "Platform"),
    ("release", "Release"),
    ("version", "Version"),
    ("machine", "Machine"),
];

const CPU_FIELDS: &[Field] = &[
    ("name", "Processor"),
    ("architecture", "Architecture"),
    ("bits", "Bits"),
    ("physical_cores", "Physical cores"),
    ("logical_cores", "Logical cores"),
    ("current_frequency_mhz", "Current MHz"),
    ("min_frequency_mhz", "Minimum MHz"),
    ("max_frequency_mhz", "Maximum MHz"),
    ("usage_percent", "Usage %"),
    ("cores_usage_percent", "Per core %"),
];

const RAM_FIELDS: &[Field] = &[
    ("total_gb", "Total GB"),
    ("used_gb", "Used GB"),
    ("available_gb", "Available GB"),
    ("percent_usage", "Used %"),
    ("percent_available", "Available %"),
];

const DISK_FIELDS: &[Field] = &[
    ("size_gb", "Size GB"),
    ("used_gb", "Used GB"),
    ("available_gb", "Available GB"),
    ("used_percent", "Used %"),
    ("available_percent", "Available %"),
];

const INTERFACE_COLUMNS: &[Field] = &[
    ("interface", "INTERFACE"),
    ("address", "ADDRESS"),
    ("netmask", "NETMASK"),
];

const PROCESS_COLUMNS: &[Field] = &[
    ("pid", "PID"),
    ("name", "NAME"),
    ("state", "STATE"),
    ("used_threads", "THREADS"),
    ("used_memory_mb", "RSS MB"),
    ("memory_use_percent", "MEM %"),
    ("user_cpu_seconds", "CPU S"),
    ("started_at", "STARTED"),
];

const COLUMN_GAP: &str = "  ";

/// Renders a topic result for a terminal.
///
/// Values that do not have the shape the topic normally produces are shown
/// as pretty-printed JSON instead.
#[must_use]
pub fn render_human_output(topic: Topic, value: &Value) -> String {
    let rendered = match topic {
        Topic::System => value.as_object().map(|object| render_fields(object, SYSTEM_FIELDS)),
        Topic::Cpu => value.as_object().map(|object| render_fields(object, CPU_FIELDS)),
        Topic::Ram => value.as_object().map(|object| render_fields(object, RAM_FIELDS)),
        Topic::Disk => value.as_object().map(|object| render_fields(object, DISK_FIELDS)),
        Topic::Network => value
            .get("interfaces")
            .and_then(Value::as_array)
            .map(|rows| render_table(rows, INTERFACE_COLUMNS)),
        Topic::Processes => value
            .as_array()
            .map(|rows| render_table(rows, PROCESS_COLUMNS)),
    };
    rendered.unwrap_or_else(|| format!("{value:#}\n"))
}

fn render_fields(object: &Map<String, Value>, fields: &[Field]) -> String {
    let present: Vec<(&str, String)> = fields
        .iter()
        .filter_map(|(key, label)| object.get(*key).map(|value| (*label, cell(value))))
        .collect();
    let width = present
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or_default();

    let mut output = String::new();
    for (label, value) in present {
        output.push_str(&format!("{label:<width$}{COLUMN_GAP}{value}\n"));
    }
    output
}

fn render_table(rows: &[Value], columns: &[Field]) -> String {
    if rows.is_empty() {
        return String::from("no entries\n");
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|(key, _)| row.get(*key).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, (_, header))| {
            cells
                .iter()
                .filter_map(|row| row.get(index))
                .map(|value| value.chars().count())
                .chain([header.chars().count()])
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut output = String::new();
    let headers: Vec<String> = columns.iter().map(|(_, header)| (*header).to_owned()).collect();
    push_row(&mut output, &headers, &widths);
    for row in &cells {
        push_row(&mut output, row, &widths);
    }
    output
}

fn push_row(output: &mut String, row: &[String], widths: &[usize]) {
    let line = row
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    output.push_str(line.trim_end());
    output.push('\n');
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("n/a"),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_labelled_fields_in_topic_order() {
        let rendered = render_human_output(
            Topic::Ram,
            &json!({
                "available_gb": 2.0,
                "percent_available": 25.0,
                "percent_usage": 75.0,
                "total_gb": 8.0,
                "used_gb": 6.0,
            }),
        );
        assert_eq!(
            rendered,
            "Total GB      8.0\n\
             Used GB       6.0\n\
             Available GB  2.0\n\
             Used %        75.0\n\
             Available %   25.0\n"
        );
    }

    #[test]
    fn renders_missing_frequencies_as_not_available() {
        let rendered = render_human_output(
            Topic::Cpu,
            &json!({"name": "Example", "max_frequency_mhz": null, "cores_usage_percent": [1.5, 2.0]}),
        );
        assert!(rendered.contains("Maximum MHz  n/a"));
        assert!(rendered.contains("Per core %   1.5, 2.0"));
    }

    #[test]
    fn renders_processes_as_a_table() {
        let rendered = render_human_output(
            Topic::Processes,
            &json!([
                {"pid": 42, "name": "sysmond", "state": "sleeping", "used_threads": 5,
                 "used_memory_mb": 10.5, "memory_use_percent": 0.1,
                 "user_cpu_seconds": 2.5, "started_at": 1_700_000_090},
                {"pid": 7, "name": "init", "state": "sleeping", "used_threads": 1,
                 "used_memory_mb": 3.0, "memory_use_percent": 0.0},
            ]),
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PID  NAME     STATE"));
        assert!(lines[1].starts_with("42   sysmond  sleeping"));
        assert!(lines[0].ends_with("CPU S  STARTED"));
        assert!(lines[1].ends_with("2.5    1700000090"));
    }

    #[test]
    fn renders_empty_interface_list() {
        assert_eq!(
            render_human_output(Topic::Network, &json!({"interfaces": []})),
            "no entries\n"
        );
    }

    #[test]
    fn unexpected_shapes_fall_back_to_json() {
        let rendered = render_human_output(Topic::Processes, &json!({"unexpected": true}));
        assert!(rendered.contains("\"unexpected\": true"));
    }
}
