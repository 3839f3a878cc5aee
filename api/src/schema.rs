/// Named row positions for every stats.nba.com result set the pipeline reads.
///
/// Rows on the wire are bare arrays, so each position we depend on is declared
/// exactly once here, together with the header the site publishes for it.
/// Extraction code looks fields up by column name and never hard-codes an index.
use crate::Endpoint;
use crate::stats::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Name used in the CSV output.
    pub column: &'static str,
    /// Header the stats site publishes for the same position.
    pub header: &'static str,
    pub index: usize,
}

const fn field(column: &'static str, header: &'static str, index: usize) -> Field {
    Field { column, header, index }
}

const fn same(name: &'static str, index: usize) -> Field {
    Field { column: name, header: name, index }
}

#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    /// Which entry of `resultSets` holds the rows.
    pub result_set: usize,
    /// Identifying field that is checked but not emitted (team id for team rows).
    pub key: Option<Field>,
    /// Emitted fields, in output order.
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, column: &str) -> Option<&Field> {
        self.key
            .iter()
            .chain(self.fields.iter())
            .find(|f| f.column == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.column)
    }

    /// When the result set carries its header row, every declared position
    /// must still hold the header we expect. Payloads without headers pass.
    pub fn check_headers(&self, set: &ResultSet) -> Result<(), String> {
        if set.headers.is_none() {
            return Ok(());
        }
        for f in self.key.iter().chain(self.fields.iter()) {
            match set.header(f.index) {
                Some(h) if h == f.header => {}
                Some(h) => {
                    return Err(format!(
                        "{}: expected header {} at position {}, found {h}",
                        self.name, f.header, f.index
                    ));
                }
                None => {
                    return Err(format!(
                        "{}: no header at position {} (expected {})",
                        self.name, f.index, f.header
                    ));
                }
            }
        }
        Ok(())
    }
}

pub const TEAM_ID: Field = same("TEAM_ID", 1);

// ---------------------------------------------------------------------------
// Season game log  (leaguegamelog, one row per team per game)
// ---------------------------------------------------------------------------

pub const SEASON_ID: Field = same("SEASON_ID", 0);
pub const GAME_ID: Field = same("GAME_ID", 4);

// ---------------------------------------------------------------------------
// Box-score documents
// ---------------------------------------------------------------------------

pub static SUMMARY: Schema = Schema {
    name: "GameSummary",
    result_set: 0,
    key: None,
    fields: &[
        field("DATE", "GAME_DATE_EST", 0),
        field("H_ID", "HOME_TEAM_ID", 6),
        field("A_ID", "VISITOR_TEAM_ID", 7),
        same("SEASON", 8),
    ],
};

pub static TRADITIONAL: Schema = Schema {
    name: "TeamStats (traditional)",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[
        same("FGM", 6),
        same("FGA", 7),
        same("FG_PCT", 8),
        same("FG3M", 9),
        same("FG3A", 10),
        same("FG3_PCT", 11),
        same("FTM", 12),
        same("FTA", 13),
        same("FT_PCT", 14),
        same("OREB", 15),
        same("DREB", 16),
        same("REB", 17),
        same("AST", 18),
        same("STL", 19),
        same("BLK", 20),
        same("TO", 21),
        same("PF", 22),
        same("PTS", 23),
        field("PLUS_MIN", "PLUS_MINUS", 24),
    ],
};

pub static FOUR_FACTORS: Schema = Schema {
    name: "sqlTeamsFourFactors",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[same("TM_TOV_PCT", 8)],
};

pub static ADVANCED: Schema = Schema {
    name: "TeamStats (advanced)",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[
        same("OFF_RATING", 7),
        same("DEF_RATING", 9),
        same("EFG_PCT", 20),
        same("TS_PCT", 21),
        same("PACE", 25),
        same("PIE", 28),
    ],
};

pub static MISC: Schema = Schema {
    name: "sqlTeamsMisc",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[
        field("PTS_OFF_TO", "PTS_OFF_TOV", 6),
        same("PTS_2ND_CHANCE", 7),
        same("PTS_FB", 8),
        same("PTS_PAINT", 9),
    ],
};

/// Scoring breakdowns are fetched and side-checked but contribute no columns.
pub static SCORING: Schema = Schema {
    name: "sqlTeamsScoring",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[],
};

pub static TRACKING: Schema = Schema {
    name: "TeamStats (tracking)",
    result_set: 1,
    key: Some(TEAM_ID),
    fields: &[
        same("DIST", 6),
        same("ORBC", 7),
        same("DRBC", 8),
        same("RBC", 9),
        same("TCHS", 10),
        same("SAST", 11),
        same("PASS", 13),
        same("CFGM", 15),
        same("CFGA", 16),
        same("UFGM", 18),
        same("UFGA", 19),
    ],
};

/// Per-team documents in the order their columns appear in a flat record.
pub const FLAT_GROUPS: [Endpoint; 5] = [
    Endpoint::Traditional,
    Endpoint::FourFactors,
    Endpoint::Advanced,
    Endpoint::Misc,
    Endpoint::Tracking,
];

pub fn schema_for(endpoint: Endpoint) -> &'static Schema {
    match endpoint {
        Endpoint::Summary => &SUMMARY,
        Endpoint::Traditional => &TRADITIONAL,
        Endpoint::FourFactors => &FOUR_FACTORS,
        Endpoint::Advanced => &ADVANCED,
        Endpoint::Misc => &MISC,
        Endpoint::Scoring => &SCORING,
        Endpoint::Tracking => &TRACKING,
    }
}
