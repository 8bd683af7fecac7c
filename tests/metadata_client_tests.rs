//! TMDB client against a mock HTTP server, and enrichment with fake providers.

use std::collections::HashSet;

use reelmatch_lib::metadata_client::{enrich, enrich_selection};
use reelmatch_lib::{
    CastMember, Enrichment, Item, ItemId, MetadataError, MetadataProvider, MovieDetails, Recommendation,
    TmdbClient, TmdbConfig,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> TmdbClient {
    TmdbClient::new(TmdbConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        ..TmdbConfig::default()
    })
    .unwrap()
}

async fn mount_avatar(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/movie/19995"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("language", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Avatar",
            "overview": "In the 22nd century, a paraplegic Marine is dispatched to the moon Pandora.",
            "release_date": "2009-12-10",
            "vote_average": 7.2,
            "poster_path": "/kyeqWdyUXW608qlYkRqosgbbJyK.jpg",
            "runtime": 162,
            "tagline": "Enter the world of Pandora.",
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "spoken_languages": [{"english_name": "English", "iso_639_1": "en"}, {"english_name": "Spanish"}],
            "vote_count": 11800,
            "popularity": 150.4,
            "production_companies": [{"name": "Lightstorm Entertainment"}, {"name": "20th Century Fox"}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/movie/19995/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"site": "YouTube", "type": "Featurette", "key": "feat"},
                {"site": "YouTube", "type": "Trailer", "key": "5PSNL1qE6VY"}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/movie/19995/credits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cast": [
                {"name": "Sam Worthington", "character": "Jake Sully", "profile_path": "/sam.jpg"},
                {"name": "Zoe Saldana", "character": "Neytiri", "profile_path": null},
                {"name": "Sigourney Weaver", "character": "Dr. Grace Augustine"}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_details_maps_response() {
    let server = MockServer::start().await;
    mount_avatar(&server).await;
    let client = client_for(&server);

    let details = client.get_details(19995).await.unwrap();
    assert_eq!(details.title, "Avatar");
    assert_eq!(details.release_date.as_deref(), Some("2009-12-10"));
    assert_eq!(details.rating, Some(7.2));
    assert_eq!(details.runtime, Some(162));
    assert_eq!(
        details.poster_url,
        "https://image.tmdb.org/t/p/w500/kyeqWdyUXW608qlYkRqosgbbJyK.jpg"
    );
    assert_eq!(details.genres, vec!["Action", "Science Fiction"]);
    assert_eq!(details.languages, vec!["English", "Spanish"]);
    assert_eq!(details.production_companies.len(), 2);
    assert_eq!(
        details.trailer_url.as_deref(),
        Some("https://www.youtube.com/watch?v=5PSNL1qE6VY")
    );
}

#[tokio::test]
async fn test_get_cast_is_bounded_with_placeholder_profiles() {
    let server = MockServer::start().await;
    mount_avatar(&server).await;
    let client = client_for(&server);

    let cast = client.get_cast(19995, 2).await.unwrap();
    assert_eq!(cast.len(), 2);
    assert_eq!(cast[0].name, "Sam Worthington");
    assert_eq!(cast[0].profile_url, "https://image.tmdb.org/t/p/w500/sam.jpg");
    assert_eq!(cast[1].character, "Neytiri");
    assert_eq!(cast[1].profile_url, TmdbConfig::default().placeholder_image_url);
}

#[tokio::test]
async fn test_missing_poster_and_trailer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Obscure", "poster_path": null})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/7/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let details = client_for(&server).get_details(7).await.unwrap();
    assert_eq!(details.poster_url, TmdbConfig::default().placeholder_image_url);
    assert_eq!(details.trailer_url, None);
    assert_eq!(details.overview, "No overview available.");
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).get_details(404).await.unwrap_err();
    assert!(matches!(err, MetadataError::Http { status_code: 404, .. }));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/1/credits"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_cast(1, 5).await.unwrap_err();
    assert!(matches!(err, MetadataError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = TmdbClient::new(TmdbConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: Some("k".to_string()),
        timeout_ms: 500,
        ..TmdbConfig::default()
    })
    .unwrap();
    let err = client.get_trailer(1).await.unwrap_err();
    assert!(matches!(err, MetadataError::Network { .. }));
}

/// In-memory provider that fails for a fixed set of ids
struct FakeProvider {
    failing: HashSet<ItemId>,
}

impl MetadataProvider for FakeProvider {
    async fn get_details(&self, id: ItemId) -> Result<MovieDetails, MetadataError> {
        if self.failing.contains(&id) {
            return Err(MetadataError::Http {
                status_code: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(MovieDetails {
            id,
            title: format!("Movie {}", id),
            overview: String::new(),
            release_date: None,
            rating: None,
            poster_url: TmdbConfig::default().image_url(None),
            runtime: None,
            tagline: String::new(),
            genres: Vec::new(),
            languages: Vec::new(),
            vote_count: None,
            popularity: None,
            production_companies: Vec::new(),
            trailer_url: None,
        })
    }

    async fn get_cast(&self, id: ItemId, top_n: usize) -> Result<Vec<CastMember>, MetadataError> {
        Ok((0..top_n)
            .map(|i| CastMember {
                name: format!("Actor {}-{}", id, i),
                character: String::new(),
                profile_url: String::new(),
            })
            .collect())
    }

    async fn get_trailer(&self, _id: ItemId) -> Result<Option<String>, MetadataError> {
        Ok(None)
    }
}

fn recommendation(rank: usize, id: ItemId) -> Recommendation {
    Recommendation {
        rank,
        index: rank + 1,
        title: format!("Movie {}", id),
        id,
        score: 1.0 - rank as f32 / 10.0,
    }
}

#[tokio::test]
async fn test_enrichment_failures_do_not_drop_results() {
    let provider = FakeProvider {
        failing: HashSet::from([20]),
    };
    let recs = vec![recommendation(0, 10), recommendation(1, 20), recommendation(2, 30)];

    let enriched = enrich(recs.clone(), &provider, 3).await;
    assert_eq!(enriched.len(), 3);
    for (entry, rec) in enriched.iter().zip(&recs) {
        assert_eq!(&entry.recommendation, rec);
    }

    assert!(enriched[0].enrichment.is_available());
    match &enriched[1].enrichment {
        Enrichment::Unavailable { reason } => assert!(reason.contains("503")),
        other => panic!("expected unavailable, got {:?}", other),
    }
    match &enriched[2].enrichment {
        Enrichment::Available { details, cast } => {
            assert_eq!(details.id, 30);
            assert_eq!(cast.len(), 3);
        }
        other => panic!("expected details, got {:?}", other),
    }
}

#[tokio::test]
async fn test_enrich_selection_uses_item_id() {
    let provider = FakeProvider { failing: HashSet::new() };
    let item = Item::new(42, "Selected", "tags");
    match enrich_selection(&item, &provider, 1).await {
        Enrichment::Available { details, cast } => {
            assert_eq!(details.id, 42);
            assert_eq!(cast[0].name, "Actor 42-0");
        }
        other => panic!("expected details, got {:?}", other),
    }
}
