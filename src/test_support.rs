use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// Build an in-memory PDF with one text line per page
pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content stream should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}

/// Answer `GET /api/tags` with the given model names
pub(crate) async fn mock_tags(server: &wiremock::MockServer, models: &[&str]) {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let models = models
        .iter()
        .map(|name| serde_json::json!({ "name": name, "size": 1024 }))
        .collect::<Vec<_>>();

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": models })))
        .mount(server)
        .await;
}

/// Service pointed at a mock server with a short probe timeout
pub(crate) fn mock_service(server: &wiremock::MockServer) -> crate::ollama::OllamaService {
    let url = url::Url::parse(&server.uri()).expect("mock server uri should parse");
    crate::ollama::OllamaService::new(url, std::time::Duration::from_secs(2))
}

/// Service pointed at a port nothing listens on
pub(crate) fn unreachable_service() -> crate::ollama::OllamaService {
    let url = url::Url::parse("http://127.0.0.1:1").expect("static url should parse");
    crate::ollama::OllamaService::new(url, std::time::Duration::from_millis(500))
}
