diesel::table! {
    #[sql_name = "hive_accounts"]
    account (id) {
        id -> Int4,
        #[max_length = 16]
        name -> Varchar,
    }
}

diesel::table! {
    #[sql_name = "hive_posts"]
    post (id) {
        id -> Int4,
        parent_id -> Nullable<Int4>,
        #[max_length = 16]
        author -> Varchar,
        #[max_length = 255]
        permlink -> Varchar,
        #[max_length = 16]
        community -> Nullable<Varchar>,
        #[max_length = 255]
        category -> Varchar,
        depth -> Int4,
        created_at -> Timestamp,
        is_deleted -> Bool,
        is_pinned -> Bool,
        is_muted -> Bool,
        is_valid -> Bool,
        promoted -> Numeric,
    }
}

diesel::table! {
    #[sql_name = "hive_posts_cache"]
    posts_cache (post_id) {
        post_id -> Int4,
        #[max_length = 16]
        author -> Varchar,
        #[max_length = 255]
        permlink -> Varchar,
        #[max_length = 255]
        category -> Varchar,
        payout -> Numeric,
        children -> Int4,
        author_rep -> Float8,
        total_votes -> Int4,
        up_votes -> Int4,
        rshares -> Int8,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        payout_at -> Timestamp,
        body -> Text,
        json -> Text,
        is_paidout -> Bool,
        is_nsfw -> Bool,
        is_declined -> Bool,
        is_full_power -> Bool,
        is_hidden -> Bool,
        is_grayed -> Bool,
    }
}

diesel::table! {
    #[sql_name = "hive_blocks"]
    block (num) {
        num -> Int4,
        #[max_length = 40]
        hash -> Varchar,
        #[max_length = 40]
        prev -> Nullable<Varchar>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_follows"]
    follow (follower, following) {
        follower -> Int4,
        following -> Int4,
        state -> Int2,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_reblogs"]
    reblog (account, post_id) {
        #[max_length = 16]
        account -> Varchar,
        post_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_flags"]
    flag (account, post_id) {
        #[max_length = 16]
        account -> Varchar,
        post_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_payments"]
    payment (id) {
        id -> Int4,
        block_num -> Int4,
        tx_idx -> Int2,
        post_id -> Int4,
        from_account -> Int4,
        to_account -> Int4,
        amount -> Numeric,
        #[max_length = 5]
        token -> Varchar,
    }
}

diesel::table! {
    #[sql_name = "hive_post_tags"]
    post_tag (post_id, tag) {
        post_id -> Int4,
        #[max_length = 32]
        tag -> Varchar,
    }
}

diesel::table! {
    #[sql_name = "hive_members"]
    member (community, account) {
        #[max_length = 16]
        community -> Varchar,
        #[max_length = 16]
        account -> Varchar,
        is_admin -> Bool,
        is_mod -> Bool,
        is_approved -> Bool,
        is_muted -> Bool,
    }
}

diesel::table! {
    #[sql_name = "hive_communities"]
    community (name) {
        #[max_length = 16]
        name -> Varchar,
        #[max_length = 32]
        title -> Varchar,
        about -> Text,
        description -> Text,
        settings -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_feed_cache"]
    feed_cache (post_id, account_id) {
        post_id -> Int4,
        account_id -> Int4,
        created_at -> Timestamp,
    }
}

diesel::table! {
    #[sql_name = "hive_state"]
    state (block_num) {
        block_num -> Int4,
        db_version -> Int4,
        steem_per_mvest -> Numeric,
        usd_per_steem -> Numeric,
        sbd_per_steem -> Numeric,
        dgpo -> Text,
    }
}

diesel::joinable!(posts_cache -> post (post_id));
diesel::joinable!(reblog -> post (post_id));
diesel::joinable!(flag -> post (post_id));
diesel::joinable!(post_tag -> post (post_id));
diesel::joinable!(feed_cache -> post (post_id));
diesel::joinable!(feed_cache -> account (account_id));
diesel::joinable!(payment -> post (post_id));
diesel::joinable!(payment -> block (block_num));
diesel::joinable!(member -> community (community));

diesel::allow_tables_to_appear_in_same_query!(
    account,
    post,
    posts_cache,
    block,
    follow,
    reblog,
    flag,
    payment,
    post_tag,
    member,
    community,
    feed_cache,
    state,
);
