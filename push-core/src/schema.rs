use diesel::{allow_tables_to_appear_in_same_query, joinable, table};

table! {
    notifications (id) {
        id -> BigInt,
        title -> Text,
        title_secondary -> Nullable<Text>,
        description -> Text,
        description_secondary -> Nullable<Text>,
        is_general -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    user_notifications (id) {
        id -> BigInt,
        notification_id -> BigInt,
        user_id -> BigInt,
        created_at -> Timestamptz,
    }
}

table! {
    user_fcm_tokens (id) {
        id -> BigInt,
        user_id -> BigInt,
        fcm_token -> Text,
        created_at -> Timestamptz,
    }
}

joinable!(user_notifications -> notifications (notification_id));

allow_tables_to_appear_in_same_query!(
    notifications,
    user_notifications,
    user_fcm_tokens,
);
