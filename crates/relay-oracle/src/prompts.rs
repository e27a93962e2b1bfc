//! 버전이 붙은 고정 지시문.
//!
//! 지시문 본문이 바뀌면 버전도 올립니다. 버전 태그는 지시문 첫 줄에 들어가며
//! 캐시된 결과가 어떤 지시문으로 만들어졌는지 로그로 추적할 때 사용합니다.

/// 펀더멘털 분석 지시문 버전.
pub const ANALYSIS_PROMPT_VERSION: &str = "fundamental-v3";

/// 경제 캘린더 지시문 버전.
pub const CALENDAR_PROMPT_VERSION: &str = "calendar-v2";

/// 뉴스 지시문 버전.
pub const NEWS_PROMPT_VERSION: &str = "news-v2";

const ANALYSIS_INSTRUCTIONS: &str = r#"You are a real-time fundamental analysis system producing a pre-market report for the US equity session.
Combine economic data, central bank policy, corporate developments and intermarket signals into a directional session bias.

Work through the following phases, running targeted web searches in each:

Phase 1 - Today's data calendar
  Find every US release scheduled today (08:30, 10:00 and 14:00 ET windows) and any Fed speakers.
  Rank releases: Tier 1 (NFP, CPI, FOMC, GDP), Tier 2 (Retail Sales, PPI, Jobless Claims, PMIs), Tier 3 (sentiment, housing).

Phase 2 - Consensus and baseline
  For each Tier 1-2 release: consensus forecast, previous actual, and the latest leading indicator.
  If no Tier 1-2 data is due, spend these searches on corporate and sector news instead.

Phase 3 - Fed policy pulse
  Latest FOMC statement, current rate expectations, recent Chair comments.
  Interpret data surprises through the current policy cycle.

Phase 4 - Intermarket and pre-market signals
  10-year Treasury yield, DXY, S&P 500 futures, VIX.

Phase 5 - Corporate and sector catalysts
  Earnings due today, mega-cap news, sector rotation.

Phase 6 - Synthesis
  Weigh the evidence, assign probabilities to bullish, neutral and bearish scenarios, and name invalidation triggers.

Output ONLY a JSON object with these keys:
  "report_date", "session_bias" ("BULLISH" | "NEUTRAL" | "BEARISH"), "confidence" (0-100),
  "economic_calendar" (array of {"time", "release", "tier", "consensus", "previous"}),
  "fed_context", "intermarket" ({"ten_year_yield", "dxy", "spx_futures", "vix"}),
  "scenarios" (array of {"name", "probability", "trigger", "expected_move"}),
  "trading_framework" ({"primary_bias", "optimal_entry_window", "risk_factors", "invalidation_triggers"}),
  "sector_outlook" ({"outperformers", "underperformers", "rationale"}),
  "key_risks_today" (array of strings).
Do not include technical analysis."#;

const CALENDAR_INSTRUCTIONS: &str = r#"You are a macroeconomic research system retrieving scheduled economic releases.
Search multiple authoritative sources and cross-check consensus and previous values.

For every major and minor release in the requested date range, return an object with:
  "date" (YYYY-MM-DD), "time" (HH:MM, 24h UTC), "country" (ISO code), "event" (official name),
  "currency", "impact" ("High" | "Medium" | "Low"), "previous", "forecast", "actual" (null if not released).

Respond ONLY with a JSON array. No introduction, no commentary. Never invent events."#;

const NEWS_INSTRUCTIONS: &str = r#"You are a senior financial news correspondent.
Identify the 10 most market-moving macroeconomic and geopolitical stories of the last 24 hours for forex and global equities.

For each story return an object with:
  "title", "summary" (2-3 factual sentences), "source", "date" (YYYY-MM-DD HH:MM UTC),
  "impact" ("High" | "Medium" | "Low"), "affected_pairs" (array, e.g. ["EUR/USD", "XAU/USD"]),
  "sentiment" ("BULLISH" | "BEARISH" | "NEUTRAL").

Respond ONLY with a JSON array. No introduction, no commentary, no technical analysis."#;

fn versioned(version: &str, body: &str, context: &str) -> String {
    format!("[instruction-set: {version}]\n{body}\n\n{context}")
}

/// 펀더멘털 분석 지시문.
pub fn fundamental_analysis(date: &str, time: &str) -> String {
    versioned(
        ANALYSIS_PROMPT_VERSION,
        ANALYSIS_INSTRUCTIONS,
        &format!(
            "# CURRENT CONTEXT\nDate: {date}\nTime: {time}\nMarket: US equities, New York session\n\nExecute all phases now. Output ONLY the analysis JSON."
        ),
    )
}

/// 기간 지정 경제 캘린더 지시문.
pub fn economic_calendar(date_from: &str, date_to: &str) -> String {
    versioned(
        CALENDAR_PROMPT_VERSION,
        CALENDAR_INSTRUCTIONS,
        &format!("# SEARCH PARAMETERS\nStart date: {date_from}\nEnd date: {date_to}\n\nPerform the research now and return the JSON array."),
    )
}

/// 최신 시장 뉴스 지시문.
pub fn market_news() -> String {
    versioned(
        NEWS_PROMPT_VERSION,
        NEWS_INSTRUCTIONS,
        "Begin the research now and return the top 10 stories as a JSON array.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_version_and_context() {
        let analysis = fundamental_analysis("2026-01-05", "08:00:00");
        assert!(analysis.starts_with("[instruction-set: fundamental-v3]"));
        assert!(analysis.contains("Date: 2026-01-05"));

        let calendar = economic_calendar("2026-01-05", "2026-01-12");
        assert!(calendar.contains(CALENDAR_PROMPT_VERSION));
        assert!(calendar.contains("End date: 2026-01-12"));

        assert!(market_news().contains(NEWS_PROMPT_VERSION));
    }
}
