use crate::solver::Solution;
use crate::{Config, Participant};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

const INPUT_FORMAT: &str = "X-workshopdata-simple";
const OUTPUT_FORMAT: &str = "X-workshopassignment-simple";
const VERSION: &str = "1.0";

/// Read the list of participants and the (optional) configuration from the simple JSON
/// representation (canonical serde_json serialization of `Participant` and `Config` objects).
///
/// A `format` tag is not required, but if present, it must match the input format.
pub fn read<R: std::io::Read>(reader: R) -> Result<(Vec<Participant>, Option<Config>), String> {
    let mut data: serde_json::Value =
        serde_json::from_reader(reader).map_err(|err| err.to_string())?;

    if let Some(format) = data.get("format") {
        if format.as_str() != Some(INPUT_FORMAT) {
            return Err(format!(
                "Unsupported input format {}, expected \"{}\"",
                format, INPUT_FORMAT
            ));
        }
    }

    let participants: Vec<Participant> = match data.get_mut("participants") {
        Some(p) => serde_json::from_value(p.take()).map_err(|e| format!("{}", e))?,
        None => return Err("No participants found in input data".to_owned()),
    };
    let config: Option<Config> = match data.get_mut("config") {
        Some(c) if !c.is_null() => {
            Some(serde_json::from_value(c.take()).map_err(|e| format!("{}", e))?)
        }
        _ => None,
    };

    Ok((participants, config))
}

/// Write the calculated assignment as simple JSON representation to a Writer (e.g. an output file).
///
/// Next to the assignment and statistics, the output contains three tables (header and rows) for
/// spreadsheet exports: participants with their workshop per day, occupancy per workshop and day
/// and the summary metrics.
pub fn write<W: std::io::Write>(
    mut writer: W,
    solution: &Solution,
    participants: &[Participant],
) -> Result<(), String> {
    let num_days = solution.statistics.num_days;

    let mut participant_header = vec!["ID".to_owned(), "Name".to_owned(), "Cohort".to_owned()];
    participant_header.extend((1..=num_days).map(|d| format!("Day {}", d)));
    participant_header.extend((1..=crate::MAX_CHOICES).map(|r| format!("Choice {}", r)));
    let participant_rows: Vec<serde_json::Value> = participants
        .iter()
        .map(|p| {
            let mut row = vec![json!(p.id), json!(p.name), json!(p.cohort)];
            let activities = solution.assignment.get(&p.id);
            for d in 0..num_days {
                row.push(json!(activities.and_then(|a| a.get(d)).map_or("", |a| a.as_str())));
            }
            for r in 1..=crate::MAX_CHOICES {
                row.push(json!(p.choice(r).unwrap_or("")));
            }
            serde_json::Value::Array(row)
        })
        .collect();

    let occupancy_rows: Vec<serde_json::Value> = solution
        .statistics
        .occupancy
        .iter()
        .map(|o| json!([o.activity, o.day, o.count, o.names.join(", ")]))
        .collect();

    let metric_rows: Vec<serde_json::Value> = solution
        .statistics
        .metric_rows()
        .into_iter()
        .map(|(metric, value)| json!([metric, value]))
        .collect();

    let a: serde_json::Value =
        serde_json::to_value(&solution.assignment).map_err(|e| format!("{}", e))?;
    let s: serde_json::Value =
        serde_json::to_value(&solution.statistics).map_err(|e| format!("{}", e))?;
    let data = json!({
        "format": OUTPUT_FORMAT,
        "version": VERSION,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        "score": solution.score,
        "assignment": a,
        "statistics": s,
        "tables": {
            "participants": {
                "header": participant_header,
                "rows": participant_rows,
            },
            "occupancy": {
                "header": ["Workshop", "Day", "Count", "Participants"],
                "rows": occupancy_rows,
            },
            "metrics": {
                "header": ["Metric", "Value"],
                "rows": metric_rows,
            },
        },
    });
    serde_json::to_writer(&mut writer, &data).map_err(|e| format!("{}", e))?;
    writer.flush().map_err(|e| format!("{}", e))?;

    Ok(())
}

/// Write the list of participants and the configuration to the simple JSON representation, as
/// accepted by `read()`.
pub fn write_input_data<W: std::io::Write>(
    mut writer: W,
    participants: &[Participant],
    config: Option<&Config>,
) -> Result<(), String> {
    let p: serde_json::Value = serde_json::to_value(participants).map_err(|e| format!("{}", e))?;
    let c: serde_json::Value = serde_json::to_value(config).map_err(|e| format!("{}", e))?;
    let data = json!({
        "format": INPUT_FORMAT,
        "version": VERSION,
        "participants": p,
        "config": c,
    });
    serde_json::to_writer(&mut writer, &data).map_err(|e| format!("{}", e))?;
    writer.flush().map_err(|e| format!("{}", e))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use crate::solver::{solve, SolveOptions};
    use crate::{Catalog, CohortPolicy, Participant};

    #[test]
    fn parse_simple_file() {
        let data = include_bytes!("test_resources/simple_input.json");
        let (participants, config) = super::read(&data[..]).unwrap();

        let catalog = Catalog::from_participants(&participants);
        crate::assert_data_consitency(&participants, &catalog);
        assert_eq!(participants.len(), 6);
        assert_eq!(catalog.len(), 5);
        assert_eq!(participants[2].name, "Clara Weber");
        assert_eq!(participants[2].cohort, "5b");
        assert_eq!(participants[2].choice(1), Some("Music"));
        assert_eq!(participants[2].choice(2), None);
        assert_eq!(participants[5].cohort, "");
        assert_eq!(participants[5].choices.len(), 2);

        let config = config.unwrap();
        assert_eq!(config.num_days, 2);
        assert_eq!(config.max_participants, Some(3));
        assert_eq!(config.cohort_policy, CohortPolicy::RequireTogether);
        assert_eq!(config.weights.weight(1), 10);
    }

    #[test]
    fn parse_invalid_files() {
        let result = super::read(&br#"{"format": "X-something-else", "participants": []}"#[..]);
        assert!(result.is_err());
        let result = super::read(&br#"{"format": "X-workshopdata-simple"}"#[..]);
        assert!(result.is_err());
        let result = super::read(&br#"{"participants": [{"id": 1}]}"#[..]);
        assert!(result.is_err());

        let (participants, config) =
            super::read(&br#"{"participants": [], "config": null}"#[..]).unwrap();
        assert!(participants.is_empty());
        assert!(config.is_none());
    }

    #[test]
    fn write_simple_file() {
        let data = include_bytes!("test_resources/simple_input.json");
        let (participants, config) = super::read(&data[..]).unwrap();
        let config = config.unwrap();
        let catalog = Catalog::from_participants(&participants);
        let solution = solve(&participants, &catalog, &config, &SolveOptions::default()).unwrap();

        let mut buffer = Vec::<u8>::new();
        let result = super::write(&mut buffer, &solution, &participants);
        assert!(result.is_ok());

        // Parse buffer as JSON file
        let mut data: serde_json::Value = serde_json::from_reader(&buffer[..]).unwrap();
        assert_eq!(data["format"], "X-workshopassignment-simple");
        assert!(data["timestamp"].is_string());
        let parsed_assignment =
            serde_json::from_value::<crate::Assignment>(data["assignment"].take()).unwrap();
        assert_eq!(solution.assignment, parsed_assignment);

        let rows = data["tables"]["participants"]["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 6);
        // ID, name, cohort, 2 days, 4 choices
        assert_eq!(rows[0].as_array().unwrap().len(), 9);
        assert_eq!(
            data["tables"]["metrics"]["rows"].as_array().unwrap().len(),
            10
        );
        assert_eq!(
            data["statistics"]["total_slots"],
            serde_json::json!(12)
        );
    }

    /// Accepts all data, but fails when flushed, like a full disk behind a buffered file
    struct FailingFlush(Vec<u8>);

    impl std::io::Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "No space left on device",
            ))
        }
    }

    #[test]
    fn write_flush_error() {
        let participants = vec![Participant::new(1, "Anna", "5a", &["A", "B"])];
        let catalog = Catalog::from_participants(&participants);
        let config = crate::Config {
            num_days: 1,
            ..crate::Config::default()
        };
        let solution = solve(&participants, &catalog, &config, &SolveOptions::default()).unwrap();

        let result = super::write(FailingFlush(Vec::new()), &solution, &participants);
        assert_eq!(result, Err("No space left on device".to_owned()));
        let result = super::write_input_data(FailingFlush(Vec::new()), &participants, None);
        assert!(result.is_err());

        // Buffered writers pass the data on when flushed
        let mut buffer = Vec::<u8>::new();
        super::write(std::io::BufWriter::new(&mut buffer), &solution, &participants).unwrap();
        assert!(!buffer.is_empty());
    }

    #[test]
    fn write_and_read_input_data() {
        let participants = vec![
            Participant::new(1, "Anna", "5a", &["A", "", "B"]),
            Participant::new(2, "Ben", "", &["B"]),
        ];
        let config = crate::Config::default();
        let mut buffer = Vec::<u8>::new();
        super::write_input_data(&mut buffer, &participants, Some(&config)).unwrap();

        let (parsed_participants, parsed_config) = super::read(&buffer[..]).unwrap();
        assert_eq!(parsed_participants, participants);
        assert_eq!(parsed_config, Some(config));
    }
}
