//! Shared fixtures for integration tests: hand-built documents, canned
//! model replies, and a mock chat-completions endpoint.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use dpr_analyzer::models::AnalysisTask;

// ─── Documents ──────────────────────────────────────────────────────

/// Single-page PDF whose page content stream is `content`. Object offsets
/// and the stream length are computed so the xref table is exact.
pub fn pdf_with_content(content: &str) -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// PDF with a real text layer.
pub fn pdf_with_text_layer(phrase: &str) -> Vec<u8> {
    pdf_with_content(&format!("BT /F1 18 Tf 72 700 Td ({}) Tj ET", phrase))
}

/// PDF whose only page draws a rectangle: no text layer at all, like a scan.
pub fn pdf_without_text_layer() -> Vec<u8> {
    pdf_with_content("q 72 72 200 100 re S Q")
}

fn zip_entries(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Minimal docx: one paragraph per entry of `paragraphs`.
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_entries(&[("word/document.xml", xml)])
}

/// Minimal xlsx with two sheets. The workbook lists "Costs" first, stored
/// as `sheet2.xml`, so readers that guess by file name pick the wrong one.
pub fn xlsx_cost_sheet() -> Vec<u8> {
    let workbook = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Costs" sheetId="1" r:id="rId7"/>
    <sheet name="Notes" sheetId="2" r:id="rId8"/>
  </sheets>
</workbook>"#;
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
</Relationships>"#;
    let shared = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="5">
  <si><t>Item</t></si>
  <si><t>Cost</t></si>
  <si><t>Approved</t></si>
  <si><t>Earthwork</t></si>
  <si><r><t>Bridge </t></r><r><t>deck</t></r></si>
</sst>"#;
    let costs = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
    <row r="2"><c r="A2" t="s"><v>3</v></c><c r="B2"><v>1200</v></c><c r="C2" t="b"><v>1</v></c></row>
    <row r="3"><c r="A3" t="s"><v>4</v></c><c r="B3"><v>3450.5</v></c><c r="C3" t="b"><v>0</v></c></row>
  </sheetData>
</worksheet>"#;
    let notes = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>Remark</t></is></c></row>
    <row r="2"><c r="A2" t="inlineStr"><is><t>wrong sheet</t></is></c></row>
  </sheetData>
</worksheet>"#;
    zip_entries(&[
        ("xl/workbook.xml", workbook.to_string()),
        ("xl/_rels/workbook.xml.rels", rels.to_string()),
        ("xl/sharedStrings.xml", shared.to_string()),
        ("xl/worksheets/sheet1.xml", notes.to_string()),
        ("xl/worksheets/sheet2.xml", costs.to_string()),
    ])
}

/// Header row only: structurally valid, no data.
pub fn xlsx_header_only() -> Vec<u8> {
    let sheet = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>Item</t></is></c></row>
  </sheetData>
</worksheet>"#;
    zip_entries(&[("xl/worksheets/sheet1.xml", sheet.to_string())])
}

// ─── Model replies ──────────────────────────────────────────────────

/// Which task a prompt belongs to, recognized by the JSON keys its
/// template asks for.
pub fn task_of_prompt(prompt: &str) -> AnalysisTask {
    if prompt.contains("\"riskPercentage\"") {
        AnalysisTask::RiskAnalyze
    } else if prompt.contains("\"complianceScore\"") {
        AnalysisTask::ComplianceCheck
    } else if prompt.contains("\"inconsistencies\"") {
        AnalysisTask::InconsistencyCheck
    } else {
        AnalysisTask::Summarize
    }
}

/// Fixture completion per task. The risk reply is fenced the way chat
/// models often wrap JSON.
pub fn canned_reply(task: AnalysisTask) -> String {
    match task {
        AnalysisTask::Summarize => json!({
            "summary": "A 42 km ring road around Nagpur with an estimated cost of 450 crore."
        })
        .to_string(),
        AnalysisTask::RiskAnalyze => format!(
            "```json\n{}\n```",
            json!({
                "riskPercentage": 38,
                "clauses": [{"title": "Penalty", "excerpt": "0.5% per week of delay", "riskLevel": "High"}],
                "financials": [{"label": "Total cost", "amount": 4500000000u64, "currency": "INR"}],
                "entities": {
                    "contractors": ["Acme Infra"],
                    "agencies": ["NHAI"],
                    "locations": ["Nagpur"],
                    "people": []
                },
                "riskPredictions": {"cost": 40, "timeline": 55, "environmental": 20}
            })
        ),
        AnalysisTask::ComplianceCheck => json!({
            "complianceScore": 76,
            "complianceFindings": [
                {"requirement": "Environmental clearance", "status": "Not Met", "details": "No EIA attached"}
            ]
        })
        .to_string(),
        AnalysisTask::InconsistencyCheck => json!({
            "inconsistencies": [
                {"finding": "Length given as 42 km and 44 km", "severity": "Medium", "details": "Sections 2 and 5"}
            ]
        })
        .to_string(),
    }
}

// ─── Mock chat-completions endpoint ─────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    pub requests: Mutex<Vec<RecordedRequest>>,
    /// Respond to every call with this status and body instead of a reply.
    pub fail_with: Option<(u16, String)>,
    /// Tasks answered with prose instead of JSON.
    pub garbled: Vec<AnalysisTask>,
}

pub struct MockEndpoint {
    pub url: String,
    pub state: Arc<MockState>,
}

impl MockEndpoint {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if let Some((status, text)) = &state.fail_with {
        let status = StatusCode::from_u16(*status).unwrap();
        return (status, text.clone()).into_response();
    }

    let prompt = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    let content = if body.get("response_format").is_none() {
        "The estimated project cost is 450 crore.".to_string()
    } else {
        let task = task_of_prompt(&prompt);
        if state.garbled.contains(&task) {
            "Sorry, I could not produce JSON for this document.".to_string()
        } else {
            canned_reply(task)
        }
    };

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// Serve the mock on a free local port.
pub async fn spawn_mock_endpoint(state: MockState) -> MockEndpoint {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockEndpoint {
        url: format!("http://{}/v1/chat/completions", addr),
        state,
    }
}
