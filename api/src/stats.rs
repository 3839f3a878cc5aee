/// stats.nba.com raw wire types: serde shapes for the box-score responses.
/// Every endpoint answers with the same envelope: a list of named result sets,
/// each a header row plus positional rows.
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(default)]
    pub result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub name: Option<String>,
    /// Column names; absent in some archived payloads.
    pub headers: Option<Vec<String>>,
    #[serde(default)]
    pub row_set: Vec<Vec<Value>>,
}

impl StatsResponse {
    pub fn result_set(&self, index: usize) -> Option<&ResultSet> {
        self.result_sets.get(index)
    }
}

impl ResultSet {
    pub fn header(&self, index: usize) -> Option<&str> {
        self.headers.as_ref()?.get(index).map(String::as_str)
    }
}

/// Read a team or game id out of a row cell. Ids come back as JSON numbers,
/// but older archives quote them.
pub fn id_value(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a cell as text: strings verbatim, numbers in their JSON form.
pub fn text_value(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_result_set_envelope() {
        let raw = json!({
            "resource": "boxscore",
            "parameters": {"GameID": "0021800001"},
            "resultSets": [
                {"name": "PlayerStats", "headers": ["GAME_ID"], "rowSet": []},
                {"name": "TeamStats", "headers": ["GAME_ID", "TEAM_ID"], "rowSet": [["0021800001", 1610612737]]}
            ]
        });
        let parsed: StatsResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.result_sets.len(), 2);
        let teams = parsed.result_set(1).unwrap();
        assert_eq!(teams.name.as_deref(), Some("TeamStats"));
        assert_eq!(teams.header(1), Some("TEAM_ID"));
        assert_eq!(id_value(&teams.row_set[0][1]), Some(1610612737));
    }

    #[test]
    fn missing_headers_and_rows_default() {
        let parsed: StatsResponse =
            serde_json::from_value(json!({"resultSets": [{"name": "X"}]})).unwrap();
        let set = parsed.result_set(0).unwrap();
        assert!(set.row_set.is_empty());
        assert_eq!(set.header(0), None);
    }

    #[test]
    fn ids_accept_quoted_numbers() {
        assert_eq!(id_value(&json!("1610612738")), Some(1610612738));
        assert_eq!(id_value(&json!(null)), None);
        assert_eq!(text_value(&json!(0.478)).as_deref(), Some("0.478"));
        assert_eq!(text_value(&json!("22018")).as_deref(), Some("22018"));
    }
}
