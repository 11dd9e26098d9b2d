use sts_pipeline::{DownloadResult, Manifest, Record};

fn record(name: &str, row_index: usize) -> Record {
    Record {
        name: name.to_string(),
        detail_url: Some(format!("https://l2.test/{row_index}")),
        image_url: None,
        image_alt: None,
        row_index,
    }
}

#[test]
fn json_layout() {
    let manifest = Manifest::new(
        vec![record("Alpha", 0), record("Beta", 1)],
        vec![DownloadResult {
            record_name: "Alpha".into(),
            filename: "alpha.png".into(),
            source_url: "https://l2.test/a.png".into(),
            byte_size: 2048,
        }],
        vec![],
    );

    let json: serde_json::Value = serde_json::to_value(&manifest).unwrap();

    assert_eq!(2, json["totalProtocols"]);
    assert_eq!(1, json["imagesDownloaded"]);
    assert_eq!("https://l2.test/1", json["protocols"][1]["detailUrl"]);
    assert_eq!(1, json["protocols"][1]["rowIndex"]);
    assert!(json["protocols"][0]["imageUrl"].is_null());
    assert_eq!("Alpha", json["downloadedImages"][0]["recordName"]);
    assert_eq!(2048, json["downloadedImages"][0]["byteSize"]);
    assert!(json["failedDownloads"].as_array().unwrap().is_empty());

    // 2024-05-01T10:11:12.123Z
    let scraped_at = json["scrapedAt"].as_str().unwrap();
    assert_eq!(24, scraped_at.len(), "{scraped_at}");
    assert!(scraped_at.ends_with('Z'));
}

#[test]
fn write_overwrites_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("results.json");

    let first = Manifest::new(vec![record("Alpha", 0)], vec![], vec![]);
    first.write(&path).unwrap();
    let second = Manifest::new(vec![], vec![], vec![]);
    second.write(&path).unwrap();

    let read = Manifest::read(&path).unwrap();
    assert_eq!(second, read);
    assert!(std::fs::read_to_string(&path).unwrap().contains("\n  \"totalProtocols\": 0"));
}

#[test]
fn reads_legacy_field_names() {
    let json = r#"{
      "scrapedAt": "2024-03-02T09:08:07.654Z",
      "totalProtocols": 1,
      "imagesDownloaded": 1,
      "protocols": [
        {
          "name": "B² Network",
          "url": "https://l2.watch/b2",
          "imageUrl": "https://l2.watch/b2.png",
          "imageAlt": "B² Network",
          "rowIndex": 3
        }
      ],
      "downloadedImages": [
        {
          "protocolName": "B² Network",
          "filename": "b2-network.png",
          "originalUrl": "https://l2.watch/b2.png",
          "size": 4321
        }
      ]
    }"#;

    let manifest: Manifest = serde_json::from_str(json).unwrap();

    assert_eq!(
        Some("https://l2.watch/b2"),
        manifest.protocols[0].detail_url.as_deref()
    );
    assert_eq!(3, manifest.protocols[0].row_index);
    assert!(manifest.failed_downloads.is_empty());

    let dl = manifest.download_for("B² Network").unwrap();
    assert_eq!(4321, dl.byte_size);
    assert_eq!("https://l2.watch/b2.png", dl.source_url);
    assert!(manifest.download_for("Alpha").is_none());
    assert_eq!(
        "2024-03-02T09:08:07.654+00:00",
        manifest.scraped_at.to_rfc3339()
    );
}
