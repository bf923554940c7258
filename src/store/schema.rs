diesel::table! {
    campaigns (id) {
        id -> Integer,
        user_id -> Text,
        name -> Text,
        archetype -> Text,
        brand_json -> Text,
        icp_json -> Nullable<Text>,
        channels_json -> Text,
        assets_json -> Text,
        created_at -> BigInt,
    }
}
