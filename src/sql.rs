//! Remote operation names and catalogue queries.

pub const CREATE_PROFILE: &str = "DBMS_CLOUD_AI.CREATE_PROFILE";
pub const DROP_PROFILE: &str = "DBMS_CLOUD_AI.DROP_PROFILE";
pub const SET_ATTRIBUTE: &str = "DBMS_CLOUD_AI.SET_ATTRIBUTE";
pub const SET_ATTRIBUTES: &str = "DBMS_CLOUD_AI.SET_ATTRIBUTES";
pub const GENERATE: &str = "DBMS_CLOUD_AI.GENERATE";

pub const CREATE_VECTOR_INDEX: &str = "DBMS_CLOUD_AI.CREATE_VECTOR_INDEX";
pub const DROP_VECTOR_INDEX: &str = "DBMS_CLOUD_AI.DROP_VECTOR_INDEX";
pub const ENABLE_VECTOR_INDEX: &str = "DBMS_CLOUD_AI.ENABLE_VECTOR_INDEX";
pub const DISABLE_VECTOR_INDEX: &str = "DBMS_CLOUD_AI.DISABLE_VECTOR_INDEX";
pub const UPDATE_VECTOR_INDEX: &str = "DBMS_CLOUD_AI.UPDATE_VECTOR_INDEX";

pub const CREATE_CONVERSATION: &str = "DBMS_CLOUD_AI.CREATE_CONVERSATION";
pub const UPDATE_CONVERSATION: &str = "DBMS_CLOUD_AI.UPDATE_CONVERSATION";
pub const DROP_CONVERSATION: &str = "DBMS_CLOUD_AI.DROP_CONVERSATION";

pub const GENERATE_SYNTHETIC_DATA: &str = "DBMS_CLOUD_AI.GENERATE_SYNTHETIC_DATA";

pub const CREATE_CREDENTIAL: &str = "DBMS_CLOUD.CREATE_CREDENTIAL";
pub const DROP_CREDENTIAL: &str = "DBMS_CLOUD.DROP_CREDENTIAL";

pub const GET_USER_AI_PROFILE_ATTRIBUTES: &str = "\
SELECT attribute_name, attribute_value
FROM USER_CLOUD_AI_PROFILE_ATTRIBUTES
WHERE profile_name = :profile_name";

pub const LIST_USER_AI_PROFILES: &str = "\
SELECT profile_name, description
FROM USER_CLOUD_AI_PROFILES
WHERE REGEXP_LIKE(profile_name, :profile_name_pattern, 'i')";

pub const GET_USER_VECTOR_INDEX_ATTRIBUTES: &str = "\
SELECT attribute_name, attribute_value
FROM USER_CLOUD_VECTOR_INDEX_ATTRIBUTES
WHERE index_name = :index_name";

pub const LIST_USER_VECTOR_INDEXES: &str = "\
SELECT index_name, description
FROM USER_CLOUD_VECTOR_INDEXES
WHERE REGEXP_LIKE(index_name, :index_name_pattern, 'i')";

pub const LIST_USER_VECTOR_INDEXES_BY_PROFILE: &str = "\
SELECT v.index_name, v.description
FROM USER_CLOUD_VECTOR_INDEXES v,
     USER_CLOUD_VECTOR_INDEX_ATTRIBUTES a
WHERE lower(a.attribute_name) = 'profile_name'
AND DBMS_LOB.compare(a.attribute_value, TO_CLOB(:profile_name)) = 0
AND REGEXP_LIKE(v.index_name, :index_name_pattern, 'i')
AND v.index_name = a.index_name";

pub const GET_USER_CONVERSATION_ATTRIBUTES: &str = "\
SELECT conversation_title, description, retention_days
FROM USER_CLOUD_AI_CONVERSATIONS
WHERE conversation_id = :conversation_id";

pub const LIST_USER_CONVERSATIONS: &str = "\
SELECT conversation_id, conversation_title, description, retention_days
FROM USER_CLOUD_AI_CONVERSATIONS
WHERE REGEXP_LIKE(conversation_title, :title_pattern, 'i')";

/// `{0}` is replaced by a validated user name.
pub const GRANT_PRIVILEGES_TO_USER: &str = "\
DECLARE
    TYPE array_t IS VARRAY(3) OF VARCHAR2(60);
    v_packages array_t;
BEGIN
    v_packages := array_t('DBMS_CLOUD', 'DBMS_CLOUD_AI', 'DBMS_CLOUD_PIPELINE');
    FOR i in 1..v_packages.count LOOP
        EXECUTE IMMEDIATE 'GRANT EXECUTE ON ' || v_packages(i) || ' TO {0}';
    END LOOP;
END;";

/// `{0}` is replaced by a validated user name.
pub const REVOKE_PRIVILEGES_FROM_USER: &str = "\
DECLARE
    TYPE array_t IS VARRAY(3) OF VARCHAR2(60);
    v_packages array_t;
BEGIN
    v_packages := array_t('DBMS_CLOUD', 'DBMS_CLOUD_AI', 'DBMS_CLOUD_PIPELINE');
    FOR i in 1..v_packages.count LOOP
        EXECUTE IMMEDIATE 'REVOKE EXECUTE ON ' || v_packages(i) || ' FROM {0}';
    END LOOP;
END;";

pub const ENABLE_AI_PROFILE_DOMAIN_FOR_USER: &str = "\
BEGIN
    DBMS_NETWORK_ACL_ADMIN.APPEND_HOST_ACE(
        host => :host,
        ace  => xs$ace_type(privilege_list => xs$name_list('http'),
                            principal_name => :user,
                            principal_type => xs_acl.ptype_db)
    );
END;";

pub const DISABLE_AI_PROFILE_DOMAIN_FOR_USER: &str = "\
BEGIN
    DBMS_NETWORK_ACL_ADMIN.REMOVE_HOST_ACE(
        host => :host,
        ace  => xs$ace_type(privilege_list => xs$name_list('http'),
                            principal_name => :user,
                            principal_type => xs_acl.ptype_db)
    );
END;";
