use super::*;
use serde_json::json;

fn base() -> serde_json::Value {
    json!({
        "campaign_id": "spring_launch",
        "products": [
            {"product_id": "coffee_premium", "name": "Premium Coffee"},
            {"product_id": "tea_organic", "name": "Organic Tea", "description": "Loose leaf"}
        ],
        "target_region": "US",
        "target_audience": "Young professionals",
        "campaign_message": "Start your day right"
    })
}

#[test]
fn parses_minimal_brief() {
    let b = CampaignBrief::from_json_str(&base().to_string()).unwrap();
    assert_eq!(b.products.len(), 2);
    assert_eq!(b.products[1].description.as_deref(), Some("Loose leaf"));
    assert_eq!(b.overlay_message(), "Start your day right");
}

#[test]
fn region_specific_message_wins_when_present() {
    let mut v = base();
    v["localization"] = json!({"language": "es", "region_specific_message": "Empieza bien"});
    let b = CampaignBrief::from_json_str(&v.to_string()).unwrap();
    assert_eq!(b.overlay_message(), "Empieza bien");

    v["localization"] = json!({"language": "es", "region_specific_message": "  "});
    let b = CampaignBrief::from_json_str(&v.to_string()).unwrap();
    assert_eq!(b.overlay_message(), "Start your day right");
}

#[test]
fn rejects_missing_or_blank_fields() {
    let mut v = base();
    v.as_object_mut().unwrap().remove("target_region");
    assert!(matches!(
        CampaignBrief::from_json_str(&v.to_string()),
        Err(CraftError::Serde(_))
    ));

    let mut v = base();
    v["campaign_message"] = json!("");
    assert!(matches!(
        CampaignBrief::from_json_str(&v.to_string()),
        Err(CraftError::Validation(_))
    ));

    let mut v = base();
    v["products"] = json!([]);
    assert!(CampaignBrief::from_json_str(&v.to_string()).is_err());

    let mut v = base();
    v["localization"] = json!({"language": ""});
    assert!(CampaignBrief::from_json_str(&v.to_string()).is_err());
}

#[test]
fn product_level_problems_are_left_to_the_run() {
    let mut v = base();
    v["products"][1]["product_id"] = json!(" coffee_premium ");
    v["products"][0]["name"] = json!("  ");
    let b = CampaignBrief::from_json_str(&v.to_string()).unwrap();
    assert_eq!(b.repeated_products().into_iter().collect::<Vec<_>>(), vec![1]);

    let mut v = base();
    v["products"][0]["product_id"] = json!("");
    v["products"][1]["product_id"] = json!("");
    let b = CampaignBrief::from_json_str(&v.to_string()).unwrap();
    assert!(b.repeated_products().is_empty());
}
