//! HTML chart export of samples.
//!
//! Renders a single document with two ECharts line charts: memory usage
//! (RSS and, when the platform reports it, RSS+Swap, in MB) and CPU usage.
//! With a live host configured, the document is also written once at
//! construction and subscribes to `/process/updates` so it can be watched
//! while the run is in progress.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{Sink, SinkKind};
use crate::error::SinkError;
use crate::sample::Sample;

const ECHARTS_SRC: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";
const MEMORY_CHART_ID: &str = "memory_usage";
const CPU_CHART_ID: &str = "cpu_usage";

pub struct ChartSink {
    path: PathBuf,
    process_name: String,
    live_host: Option<String>,
    with_swap: bool,
    samples: Vec<Sample>,
    from: Option<DateTime<Local>>,
    to: Option<DateTime<Local>>,
    file: Option<File>,
}

impl ChartSink {
    pub fn create(
        path: impl AsRef<Path>,
        process_name: &str,
        live_host: Option<String>,
        with_swap: bool,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SinkError::Create {
            path: path.clone(),
            source,
        })?;

        let mut sink = Self {
            path,
            process_name: process_name.to_string(),
            live_host,
            with_swap,
            samples: Vec::new(),
            from: None,
            to: None,
            file: Some(file),
        };

        if sink.live_host.is_some() {
            let page = sink.render_page();
            sink.rewrite(&page)?;
        }

        Ok(sink)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn rewrite(&mut self, page: &str) -> Result<(), SinkError> {
        let path = self.path.clone();
        let to_err = |source| SinkError::Write {
            path: path.clone(),
            source,
        };
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SinkError::Finalized(self.path.clone()))?;

        file.set_len(0).map_err(to_err)?;
        file.seek(SeekFrom::Start(0)).map_err(to_err)?;
        file.write_all(page.as_bytes()).map_err(to_err)?;
        file.flush().map_err(to_err)
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.from = None;
        self.to = None;
    }

    /// Renders the full HTML document for the samples collected so far.
    pub fn render_page(&self) -> String {
        let parts = self.samples.len();
        let axis = match (self.from, self.to) {
            (Some(from), Some(to)) => divide_time_into_parts(from, to, parts),
            (Some(from), None) => divide_time_into_parts(from, Local::now(), parts),
            _ => Vec::new(),
        };

        let title = html_escape(&self.process_name);
        let memory = inline_json(&self.memory_chart_options(&axis));
        let cpu = inline_json(&self.cpu_chart_options(&axis));
        let live = self
            .live_host
            .as_deref()
            .map(|host| live_update_script(host, self.with_swap))
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Usage of {title}</title>
    <script src="{ECHARTS_SRC}"></script>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .chart {{ width: 900px; height: 500px; margin: 20px auto; background: white; border-radius: 8px; }}
    </style>
</head>
<body>
<div class="chart" id="{MEMORY_CHART_ID}"></div>
<div class="chart" id="{CPU_CHART_ID}"></div>
<script>
    const chart_{MEMORY_CHART_ID} = echarts.init(document.getElementById("{MEMORY_CHART_ID}"), "westeros");
    chart_{MEMORY_CHART_ID}.setOption({memory});
    const chart_{CPU_CHART_ID} = echarts.init(document.getElementById("{CPU_CHART_ID}"), "westeros");
    chart_{CPU_CHART_ID}.setOption({cpu});
{live}</script>
</body>
</html>
"#
        )
    }

    fn memory_chart_options(&self, axis: &[String]) -> Value {
        let rss: Vec<i64> = self.samples.iter().map(|s| s.rss_kb() / 1024).collect();
        let mut series = vec![line_series("RSS", json!(rss))];
        if self.with_swap {
            let rss_swap: Vec<i64> = self.samples.iter().map(|s| s.rss_swap_kb() / 1024).collect();
            series.push(line_series("RSS+Swap", json!(rss_swap)));
        }

        chart_options(
            &format!("Memory usage of {}", self.process_name),
            "The memory usage of the process (MB)",
            axis,
            series,
        )
    }

    fn cpu_chart_options(&self, axis: &[String]) -> Value {
        let cpu: Vec<String> = self
            .samples
            .iter()
            .map(|s| format!("{:.1}", s.cpu_percent()))
            .collect();

        chart_options(
            &format!("CPU usage of {}", self.process_name),
            "The cpu usage of the process",
            axis,
            vec![line_series("CPU usage", json!(cpu))],
        )
    }
}

fn line_series(name: &str, data: Value) -> Value {
    json!({
        "name": name,
        "type": "line",
        "smooth": true,
        "label": { "show": true, "position": "top" },
        "data": data,
    })
}

fn chart_options(title: &str, subtitle: &str, axis: &[String], series: Vec<Value>) -> Value {
    let legend: Vec<&Value> = series.iter().map(|s| &s["name"]).collect();
    json!({
        "title": { "text": title, "subtext": subtitle },
        "tooltip": { "show": true, "trigger": "axis" },
        "legend": { "show": true, "data": legend },
        "dataZoom": [{ "type": "slider", "start": 0, "end": 80 }],
        "xAxis": [{ "type": "category", "data": axis }],
        "yAxis": [{ "type": "value" }],
        "series": series,
    })
}

/// Serializes `value` for a `<script>` block. `<` is escaped so that text
/// such as `</script>` inside a string cannot end the element.
fn inline_json(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

fn live_update_script(host: &str, with_swap: bool) -> String {
    let host = inline_json(&Value::from(format!("http://{host}/process/updates")));
    let swap_series = if with_swap {
        r#", { name: "RSS+Swap", data: rssSwap }"#
    } else {
        ""
    };

    format!(
        r#"    (function () {{
        const rss = [], rssSwap = [], cpu = [], labels = [];
        const source = new EventSource({host});
        source.addEventListener("message", (e) => {{
            const stat = JSON.parse(e.data);
            rss.push(Math.floor(stat.memoryUsage.rss / 1024));
            rssSwap.push(Math.floor(stat.memoryUsage.rssSwap / 1024));
            cpu.push(stat.cpuUsage.percentage.toFixed(1));
            labels.push(new Date(stat.timestamp).toTimeString().slice(0, 8));
            chart_{MEMORY_CHART_ID}.setOption({{
                dataZoom: [{{ type: "slider", end: 100 }}],
                xAxis: [{{ data: labels }}],
                series: [{{ name: "RSS", data: rss }}{swap_series}],
            }});
            chart_{CPU_CHART_ID}.setOption({{
                dataZoom: [{{ type: "slider", end: 100 }}],
                xAxis: [{{ data: labels }}],
                series: [{{ name: "CPU usage", data: cpu }}],
            }});
        }});
    }})();
"#
    )
}

/// Splits `[from, to]` into `parts` equal buckets and labels the end of each
/// bucket as `HH:MM:SS`. Zero parts is treated as one.
pub fn divide_time_into_parts(
    from: DateTime<Local>,
    to: DateTime<Local>,
    parts: usize,
) -> Vec<String> {
    let parts = parts.max(1);
    let total_ms = (to - from).num_milliseconds().max(0);
    let part = ChronoDuration::milliseconds(total_ms / parts as i64);

    let mut t = from;
    (0..parts)
        .map(|_| {
            t += part;
            t.format("%H:%M:%S").to_string()
        })
        .collect()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Sink for ChartSink {
    fn add(&mut self, sample: Sample) -> Result<(), SinkError> {
        if self.file.is_none() {
            return Err(SinkError::Finalized(self.path.clone()));
        }
        if self.samples.is_empty() {
            self.from = Some(sample.captured_at);
        }
        self.samples.push(sample);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.file.is_none() {
            return Err(SinkError::Finalized(self.path.clone()));
        }
        self.to = Some(Local::now());

        let page = self.render_page();
        let written = self.rewrite(&page);

        self.file = None;
        self.reset();
        written
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Chart
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_divide_time_into_parts() {
        let from = Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let to = from + ChronoDuration::seconds(4);

        let labels = divide_time_into_parts(from, to, 4);
        assert_eq!(labels, vec!["10:00:01", "10:00:02", "10:00:03", "10:00:04"]);
    }

    #[test]
    fn test_divide_time_zero_parts_yields_one_bucket() {
        let from = Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let labels = divide_time_into_parts(from, from + ChronoDuration::seconds(10), 0);
        assert_eq!(labels, vec!["10:00:10"]);
    }

    #[test]
    fn test_finalize_writes_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.html");

        let mut sink = ChartSink::create(&path, "my<app>", None, true).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        sink.add(Sample::new(2048, 3072, 5.0, Local::now())).unwrap();
        sink.add(Sample::new(4096, 5120, 7.5, Local::now())).unwrap();
        assert_eq!(sink.samples().len(), 2);
        sink.finalize().unwrap();
        assert!(sink.samples().is_empty());

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Usage of my&lt;app&gt;"));
        assert!(html.contains("\"RSS+Swap\""));
        assert!(html.contains("\"data\":[2,4]"));
        assert!(html.contains("\"7.5\""));
        assert!(!html.contains("EventSource"));
    }

    #[test]
    fn test_live_document_written_at_construction_and_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("live.html");

        let mut sink =
            ChartSink::create(&path, "app", Some("localhost:8089".into()), false).unwrap();
        let initial = std::fs::read_to_string(&path).unwrap();
        assert!(initial.contains("http://localhost:8089/process/updates"));
        assert!(!initial.contains("RSS+Swap"));

        sink.add(Sample::new(1024, 1024, 1.0, Local::now())).unwrap();
        sink.finalize().unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert_eq!(html.matches("<!DOCTYPE html>").count(), 1);
        assert!(html.contains("\"data\":[1]"));
    }

    #[test]
    fn test_process_name_cannot_close_script() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.html");

        let mut sink = ChartSink::create(&path, "a</script><b>", None, false).unwrap();
        sink.add(Sample::new(1024, 1024, 1.0, Local::now())).unwrap();
        sink.finalize().unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("a\\u003c/script>\\u003cb>"));
        assert!(html.contains("Usage of a&lt;/script&gt;&lt;b&gt;"));
    }

    #[test]
    fn test_add_after_finalize_is_rejected() {
        let dir = tempdir().unwrap();
        let mut sink = ChartSink::create(dir.path().join("c.html"), "app", None, true).unwrap();
        sink.finalize().unwrap();
        assert!(matches!(
            sink.add(Sample::new(1, 1, 0.0, Local::now())),
            Err(SinkError::Finalized(_))
        ));
    }
}
